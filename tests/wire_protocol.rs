use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use reservo::activity::ActivityHub;
use reservo::auth::{ModuleGatePolicy, SessionAuth};
use reservo::backend::{CatalogSeed, LocalBackend};
use reservo::engine::Engine;
use reservo::model::*;
use reservo::wire;

const PASSWORD: &str = "reservo";

// ── Test infrastructure ──────────────────────────────────────

struct TestServer {
    addr: SocketAddr,
    backend: Arc<LocalBackend>,
    owner: Actor,
    resource_id: Ulid,
}

async fn start_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("reservo_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();

    let owner = Actor {
        id: Ulid::new(),
        role: ActorRole::Owner,
    };
    let resource = Resource {
        id: Ulid::new(),
        owner_id: owner.id,
        title: Some("Cabaña del Lago".into()),
        price: 50.0,
        pricing_model: PricingModel::PerNight,
        currency: None,
        slot_buffer_minutes: 0,
        commercial_mode: CommercialMode::Vacation,
        default_booking_type: None,
        manual_contact_schedule_type: None,
        enabled: true,
    };
    let resource_id = resource.id;
    let seed = CatalogSeed {
        resources: vec![resource],
        leads: vec![],
    };

    let backend = Arc::new(
        LocalBackend::open(dir.join("reservations.wal"), seed, Arc::new(ActivityHub::new()))
            .unwrap(),
    );
    let engine = Arc::new(Engine::with_backend(
        backend.clone(),
        Arc::new(ModuleGatePolicy::new(true)),
    ));
    let auth = Arc::new(SessionAuth::new(PASSWORD.into()));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine.clone();
            let auth = auth.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine, auth).await;
            });
        }
    });

    TestServer {
        addr,
        backend,
        owner,
        resource_id,
    }
}

type Client = Framed<TcpStream, LinesCodec>;

async fn connect(addr: SocketAddr) -> Client {
    Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new())
}

async fn call(client: &mut Client, frame: Value) -> Value {
    client.send(frame.to_string()).await.unwrap();
    let line = client.next().await.unwrap().unwrap();
    serde_json::from_str(&line).unwrap()
}

async fn hello(client: &mut Client, actor: &Actor) -> Value {
    call(
        client,
        json!({"op": "hello", "password": PASSWORD, "actor": actor}),
    )
    .await
}

fn create(resource_id: Ulid, check_in: &str, check_out: &str) -> Value {
    json!({
        "op": "create_manual_reservation",
        "request": {
            "resourceId": resource_id,
            "checkInDate": check_in,
            "checkOutDate": check_out,
            "guestName": "Ana"
        }
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn create_over_the_wire() {
    let server = start_test_server().await;
    let mut client = connect(server.addr).await;

    let reply = hello(&mut client, &server.owner).await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["code"], "HELLO");

    let reply = call(&mut client, json!({"op": "ping"})).await;
    assert_eq!(reply["code"], "PONG");

    let reply = call(&mut client, create(server.resource_id, "2024-03-01", "2024-03-04")).await;
    assert_eq!(reply["ok"], true);
    assert_eq!(reply["status"], 201);
    assert_eq!(reply["code"], "RESERVATION_CREATED_MANUAL");
    assert_eq!(reply["data"]["resourceId"], server.resource_id.to_string());
    assert_eq!(reply["data"]["bookingType"], "date_range");
    assert_eq!(reply["data"]["status"], "pending");
    assert_eq!(reply["data"]["total"], 150.0);
    assert_eq!(reply["data"]["currency"], "MXN");

    let stored = server.backend.reservations_for(&server.resource_id);
    assert_eq!(stored.len(), 1);
    assert_eq!(reply["data"]["id"], stored[0].0.to_string());
}

#[tokio::test]
async fn conflicts_come_back_as_409() {
    let server = start_test_server().await;
    let mut first = connect(server.addr).await;
    let mut second = connect(server.addr).await;
    hello(&mut first, &server.owner).await;
    hello(&mut second, &server.owner).await;

    let reply = call(&mut first, create(server.resource_id, "2024-03-01", "2024-03-04")).await;
    assert_eq!(reply["ok"], true);

    let reply = call(&mut second, create(server.resource_id, "2024-03-02", "2024-03-05")).await;
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["status"], 409);
    assert_eq!(reply["code"], "RESERVATION_CONFLICT");
    assert!(reply.get("data").is_none());
}

#[tokio::test]
async fn validation_errors_keep_the_session_open() {
    let server = start_test_server().await;
    let mut client = connect(server.addr).await;
    hello(&mut client, &server.owner).await;

    let reply = call(&mut client, create(server.resource_id, "2024-03-04", "2024-03-01")).await;
    assert_eq!(reply["status"], 400);
    assert_eq!(reply["code"], "DATE_RANGE_INVALID");

    let reply = call(&mut client, json!({"op": "create_manual_reservation"})).await;
    assert_eq!(reply["code"], "BAD_REQUEST");

    client.send("{not json".to_string()).await.unwrap();
    let line = client.next().await.unwrap().unwrap();
    let reply: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(reply["code"], "BAD_REQUEST");

    let reply = call(&mut client, create(server.resource_id, "2024-03-01", "2024-03-02")).await;
    assert_eq!(reply["code"], "RESERVATION_CREATED_MANUAL");
}

#[tokio::test]
async fn strangers_cannot_book() {
    let server = start_test_server().await;
    let mut client = connect(server.addr).await;
    let stranger = Actor {
        id: Ulid::new(),
        role: ActorRole::Agent,
    };
    hello(&mut client, &stranger).await;

    let reply = call(&mut client, create(server.resource_id, "2024-03-01", "2024-03-02")).await;
    assert_eq!(reply["status"], 403);
    assert_eq!(reply["code"], "FORBIDDEN");
    assert!(server.backend.reservations_for(&server.resource_id).is_empty());
}

#[tokio::test]
async fn wrong_password_closes_the_connection() {
    let server = start_test_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(
        &mut client,
        json!({"op": "hello", "password": "nope", "actor": server.owner}),
    )
    .await;
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["status"], 401);
    assert_eq!(reply["code"], "UNAUTHENTICATED");
    assert!(client.next().await.is_none());
}

#[tokio::test]
async fn operations_before_hello_are_refused() {
    let server = start_test_server().await;
    let mut client = connect(server.addr).await;

    let reply = call(&mut client, create(server.resource_id, "2024-03-01", "2024-03-02")).await;
    assert_eq!(reply["code"], "UNAUTHENTICATED");
    assert!(client.next().await.is_none());
    assert!(server.backend.reservations_for(&server.resource_id).is_empty());
}
