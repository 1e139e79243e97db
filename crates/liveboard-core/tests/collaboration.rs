//! End-to-end scenarios: two canvases editing one board through a relay.

use liveboard_core::{
    CanvasConfig, Canvas, ClientMessage, CollaborationManager, Color, CrdtLayerStore, Identity,
    Key, KeyEvent, LayerId, LayerStore, LayerType, PointerEvent, PresenceChannel, ServerMessage,
    Xywh,
};

struct Client {
    canvas: Canvas<CrdtLayerStore>,
    link: CollaborationManager,
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn client(peer_id: u64) -> Client {
    init_logger();
    let store = CrdtLayerStore::with_peer_id(peer_id).unwrap();
    let mut link = CollaborationManager::new(&store);
    let mut canvas = Canvas::new(store, peer_id, CanvasConfig::default());
    canvas.set_identity(Some(Identity::new(format!("user-{peer_id}"), "Tester")));

    link.join_room("board-1").unwrap();
    link.take_outgoing();
    let joined = ServerMessage::Joined {
        room: "board-1".to_string(),
        peer_count: 2,
        initial_sync: None,
    };
    link.handle_message(&joined.to_json().unwrap(), canvas.store_mut());
    Client { canvas, link }
}

/// Flush `from`'s pending changes and presence and hand them to `to` the way the relay would.
fn deliver(from: &mut Client, to: &mut Client) {
    from.link.flush_updates(from.canvas.store()).unwrap();
    from.canvas.flush_presence(&mut from.link).unwrap();
    let sender = from.link.connection_id();
    for json in from.link.take_outgoing() {
        let relayed = match ClientMessage::from_json(&json).unwrap() {
            ClientMessage::Sync { data } => ServerMessage::Sync { from: sender, data },
            ClientMessage::Presence { presence, .. } => ServerMessage::Presence {
                from: sender,
                presence,
            },
            _ => continue,
        };
        to.link
            .handle_message(&relayed.to_json().unwrap(), to.canvas.store_mut());
    }
    to.canvas.refresh();
}

fn insert(client: &mut Client, layer_type: LayerType, x: f64, y: f64) -> LayerId {
    client.canvas.insert_tool(layer_type).unwrap();
    client.canvas.handle_pointer(PointerEvent::down(x, y)).unwrap();
    client.canvas.handle_pointer(PointerEvent::up(x, y)).unwrap();
    client.canvas.selection()[0].clone()
}

fn drag(client: &mut Client, from: (f64, f64), to: (f64, f64)) {
    let canvas = &mut client.canvas;
    canvas.handle_pointer(PointerEvent::down(from.0, from.1)).unwrap();
    canvas.handle_pointer(PointerEvent::move_to(to.0, to.1)).unwrap();
    canvas.handle_pointer(PointerEvent::up(to.0, to.1)).unwrap();
}

fn bounds(client: &Client, id: &LayerId) -> Xywh {
    client.canvas.store().get(id).unwrap().bounds()
}

#[test]
fn test_selection_net_then_delete_is_one_undo_step() {
    let mut alice = client(1);
    let first = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);
    let second = insert(&mut alice, LayerType::Ellipse, 200.0, 0.0);
    insert(&mut alice, LayerType::Note, 400.0, 0.0);

    drag(&mut alice, (-10.0, -10.0), (310.0, 110.0));
    assert_eq!(alice.canvas.selection(), &[first.clone(), second.clone()]);

    alice.canvas.handle_key(KeyEvent::plain(Key::Delete)).unwrap();
    assert_eq!(alice.canvas.store().len(), 1);
    assert!(alice.canvas.selection().is_empty());

    assert!(alice.canvas.undo().unwrap());
    assert_eq!(alice.canvas.store().len(), 3);
    assert_eq!(alice.canvas.selection(), &[first, second]);
}

#[test]
fn test_inserts_replicate_in_order() {
    let mut alice = client(1);
    let mut bob = client(2);
    let a = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);
    let b = insert(&mut alice, LayerType::Text, 50.0, 50.0);

    deliver(&mut alice, &mut bob);
    assert_eq!(bob.canvas.store().layer_ids(), vec![a.clone(), b]);
    assert_eq!(bob.canvas.store().get(&a), alice.canvas.store().get(&a));
}

#[test]
fn test_concurrent_resizes_of_different_layers_converge() {
    let mut alice = client(1);
    let mut bob = client(2);
    let left = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);
    let right = insert(&mut alice, LayerType::Rectangle, 300.0, 0.0);
    deliver(&mut alice, &mut bob);

    alice.canvas.set_selection(vec![left.clone()]);
    drag(&mut alice, (100.0, 100.0), (120.0, 130.0));
    bob.canvas.set_selection(vec![right.clone()]);
    drag(&mut bob, (400.0, 100.0), (450.0, 150.0));

    deliver(&mut alice, &mut bob);
    deliver(&mut bob, &mut alice);

    for client in [&alice, &bob] {
        assert_eq!(bounds(client, &left), Xywh::new(0.0, 0.0, 120.0, 130.0));
        assert_eq!(bounds(client, &right), Xywh::new(300.0, 0.0, 150.0, 150.0));
    }
    assert_eq!(alice.canvas.layers(), bob.canvas.layers());
}

#[test]
fn test_concurrent_edits_of_different_fields_both_survive() {
    let mut alice = client(1);
    let mut bob = client(2);
    let id = insert(&mut alice, LayerType::Note, 0.0, 0.0);
    deliver(&mut alice, &mut bob);

    // Alice resizes while Bob recolors the same layer.
    drag(&mut alice, (100.0, 100.0), (150.0, 120.0));
    bob.canvas.set_selection(vec![id.clone()]);
    bob.canvas.set_selection_fill(Color::new(1, 2, 3)).unwrap();

    deliver(&mut alice, &mut bob);
    deliver(&mut bob, &mut alice);

    for client in [&alice, &bob] {
        let layer = client.canvas.store().get(&id).unwrap();
        assert_eq!(layer.bounds(), Xywh::new(0.0, 0.0, 150.0, 120.0));
        assert_eq!(layer.fill(), Color::new(1, 2, 3));
    }
}

#[test]
fn test_undo_only_reverts_local_gestures() {
    let mut alice = client(1);
    let mut bob = client(2);
    let id = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);
    deliver(&mut alice, &mut bob);

    drag(&mut alice, (100.0, 100.0), (200.0, 200.0));
    bob.canvas.set_selection(vec![id.clone()]);
    bob.canvas.set_selection_fill(Color::white()).unwrap();
    deliver(&mut bob, &mut alice);

    alice.canvas.handle_key(KeyEvent::command('z', false)).unwrap();
    let layer = alice.canvas.store().get(&id).unwrap();
    assert_eq!(layer.bounds(), Xywh::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(layer.fill(), Color::white());

    deliver(&mut alice, &mut bob);
    assert_eq!(bounds(&bob, &id), Xywh::new(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn test_remote_delete_clears_local_selection() {
    let mut alice = client(1);
    let mut bob = client(2);
    let id = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);
    deliver(&mut alice, &mut bob);
    bob.canvas.set_selection(vec![id]);

    alice.canvas.handle_key(KeyEvent::plain(Key::Backspace)).unwrap();
    deliver(&mut alice, &mut bob);

    assert!(bob.canvas.store().is_empty());
    assert!(bob.canvas.selection().is_empty());
}

#[test]
fn test_presence_reaches_other_client() {
    let mut alice = client(1);
    let mut bob = client(2);
    let inbox = bob.link.subscribe(2);
    let id = insert(&mut alice, LayerType::Rectangle, 0.0, 0.0);

    deliver(&mut alice, &mut bob);
    assert!(bob.canvas.receive_presence(&inbox) >= 1);
    let seen = bob.canvas.presence().others().get(&1).unwrap();
    assert_eq!(seen.selection, vec![id]);
}
