use crate::urc::{Event, SocketId};
use atat::AtatUrc;
use core::str::FromStr;

fn id(value: &str) -> SocketId {
    SocketId::from_str(value).unwrap()
}

#[test]
fn test_socket_disconnect() {
    assert_eq!(Some(Event::SocketDisconnect(id("2"))), Event::parse(b"SocketDisconnect,2"));
}

#[test]
fn test_socket_disconnect_missing_id() {
    assert_eq!(None, Event::parse(b"SocketDisconnect"));
    assert_eq!(None, Event::parse(b"SocketDisconnect,"));
}

#[test]
fn test_socket_disconnect_id_too_long() {
    assert_eq!(None, Event::parse(b"SocketDisconnect,123456789012"));
}

#[test]
fn test_socket_seed() {
    let expected = Event::SocketSeed {
        id: id("2"),
        server: id("1"),
    };

    assert_eq!(Some(expected), Event::parse(b"SocketSeed,2,1"));
}

#[test]
fn test_unknown_event() {
    assert_eq!(Some(Event::Unknown), Event::parse(b"WifiConnected"));
    assert_eq!(Some(Event::Unknown), Event::parse(b""));
}
