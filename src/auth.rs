use crate::collab::AccessPolicy;
use crate::model::{Actor, ActorRole, Resource};

/// Shared-secret session check for protocol connections.
#[derive(Debug)]
pub struct SessionAuth {
    password: String,
}

impl SessionAuth {
    pub fn new(password: String) -> Self {
        Self { password }
    }

    /// Accept the claimed actor when the password matches.
    ///
    /// The actor's id and role are taken as the client states them: anyone
    /// holding the shared password may claim `Admin`. Deployments that need
    /// role separation must authenticate actors upstream of this protocol.
    pub fn authenticate(&self, password: &str, actor: Actor) -> Option<Actor> {
        constant_time_eq(self.password.as_bytes(), password.as_bytes()).then_some(actor)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reservations-module gate plus ownership check.
///
/// Admins may book any resource; everyone else only resources they own.
#[derive(Debug, Clone, Copy)]
pub struct ModuleGatePolicy {
    reservations_enabled: bool,
}

impl ModuleGatePolicy {
    pub fn new(reservations_enabled: bool) -> Self {
        Self { reservations_enabled }
    }
}

impl AccessPolicy for ModuleGatePolicy {
    fn authorize(&self, actor: &Actor, resource: &Resource) -> Result<(), &'static str> {
        if !self.reservations_enabled {
            return Err("reservations module is disabled");
        }
        match actor.role {
            ActorRole::Admin => Ok(()),
            ActorRole::Owner | ActorRole::Agent if actor.id == resource.owner_id => Ok(()),
            _ => Err("actor does not manage this resource"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use ulid::Ulid;

    fn resource(owner_id: Ulid) -> Resource {
        Resource {
            id: Ulid::new(),
            owner_id,
            title: None,
            price: 1.0,
            pricing_model: PricingModel::FixedTotal,
            currency: None,
            slot_buffer_minutes: 0,
            commercial_mode: CommercialMode::Service,
            default_booking_type: None,
            manual_contact_schedule_type: None,
            enabled: true,
        }
    }

    #[test]
    fn password_must_match() {
        let auth = SessionAuth::new("s3cret".into());
        let actor = Actor {
            id: Ulid::new(),
            role: ActorRole::Owner,
        };
        assert_eq!(auth.authenticate("s3cret", actor), Some(actor));
        assert_eq!(auth.authenticate("s3cre", actor), None);
        assert_eq!(auth.authenticate("S3CRET", actor), None);
    }

    #[test]
    fn claimed_role_is_kept_verbatim() {
        let auth = SessionAuth::new("s3cret".into());
        let claimed = Actor {
            id: Ulid::new(),
            role: ActorRole::Admin,
        };
        let session = auth.authenticate("s3cret", claimed).unwrap();
        assert_eq!(session.role, ActorRole::Admin);
        assert!(
            ModuleGatePolicy::new(true)
                .authorize(&session, &resource(Ulid::new()))
                .is_ok()
        );
    }

    #[test]
    fn owners_manage_their_own_resources() {
        let policy = ModuleGatePolicy::new(true);
        let owner = Actor {
            id: Ulid::new(),
            role: ActorRole::Owner,
        };
        assert!(policy.authorize(&owner, &resource(owner.id)).is_ok());
        assert!(policy.authorize(&owner, &resource(Ulid::new())).is_err());

        let admin = Actor {
            id: Ulid::new(),
            role: ActorRole::Admin,
        };
        assert!(policy.authorize(&admin, &resource(Ulid::new())).is_ok());
    }

    #[test]
    fn disabled_module_blocks_everyone() {
        let policy = ModuleGatePolicy::new(false);
        let admin = Actor {
            id: Ulid::new(),
            role: ActorRole::Admin,
        };
        assert_eq!(
            policy.authorize(&admin, &resource(admin.id)),
            Err("reservations module is disabled")
        );
    }
}
