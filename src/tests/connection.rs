use crate::correlator::CommandError;
use crate::device::{Device, State};
use crate::error_codes::DeviceError;
use crate::netdev::{Netdev, AF_INET, IPPROTO_TCP, SOCK_STREAM};
use crate::stack::Error;
use crate::tests::mock::{run, test_config, MockSerial};
use alloc::vec;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4};
use embassy_futures::block_on;
use embedded_io_async::{Read, Write};
use embedded_nal_async::{AddrType, Dns, TcpConnect};

fn remote() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 80))
}

#[test]
fn test_tcp_connection() {
    let serial = MockSerial::new();
    serial.expect(b"AT+SOCKET=4,10.0.0.1,80\r\n", b"connect success ConID=3\r\nOK\r\n");
    serial.expect(b"AT+SOCKETSEND=3,4\r\n", b">");
    serial.expect(b"ping", b"OK\r\n+EVENT:SocketDown,3,4,pong\r\n");
    serial.expect(b"AT+SOCKETDEL=3\r\n", b"OK\r\n");

    let state = State::new();
    let (device, mut runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    run(&mut runner, async {
        let mut connection = TcpConnect::connect(&device, remote()).await.unwrap();
        assert_eq!(0, connection.descriptor());

        connection.write_all(b"ping").await.unwrap();

        let mut buffer = [0x0; 8];
        let length = connection.read(&mut buffer).await.unwrap();
        assert_eq!(b"pong", &buffer[..length]);

        connection.close().await.unwrap();
    });

    assert_eq!(
        vec!["AT+SOCKET=4,10.0.0.1,80\r\n", "AT+SOCKETSEND=3,4\r\n", "ping", "AT+SOCKETDEL=3\r\n"],
        serial.get_written_as_strings()
    );

    // Slot is free again
    assert_eq!(Ok(0), device.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP));
}

#[test]
fn test_tcp_connect_error_frees_socket() {
    let serial = MockSerial::new();
    serial.expect(b"AT+SOCKET=4,10.0.0.1,80\r\n", b"ERROR:97\r\n");

    let state = State::new();
    let (device, mut runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    let result = run(&mut runner, TcpConnect::connect(&device, remote()));

    match result {
        Err(error) => assert_eq!(Error::ConnectError(CommandError::Device(DeviceError::from_code(97))), error),
        Ok(_) => panic!("Connect should fail"),
    }

    assert_eq!(Ok(0), device.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP));
}

#[test]
fn test_tcp_connect_ipv6() {
    let serial = MockSerial::new();
    let state = State::new();
    let (device, _runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    let remote = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 80);

    match block_on(TcpConnect::connect(&device, remote)) {
        Err(error) => assert_eq!(Error::FamilyNotSupported, error),
        Ok(_) => panic!("IPv6 should not be supported"),
    }

    assert!(serial.get_written_as_strings().is_empty());
}

#[test]
fn test_dns_literal() {
    let serial = MockSerial::new();
    let state = State::new();
    let (device, _runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    let address = block_on(Dns::get_host_by_name(&device, "10.0.0.5", AddrType::IPv4)).unwrap();

    assert_eq!(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), address);
    assert!(serial.get_written_as_strings().is_empty());
}

#[test]
fn test_dns_resolve() {
    let serial = MockSerial::new();
    serial.expect(b"AT+WDOMAIN=example.com\r\n", b"+WDOMAIN:93.184.216.34\r\nOK\r\n");

    let state = State::new();
    let (device, mut runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    let address = run(&mut runner, Dns::get_host_by_name(&device, "example.com", AddrType::Either)).unwrap();

    assert_eq!(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), address);
}

#[test]
fn test_dns_unsupported() {
    let serial = MockSerial::new();
    let state = State::new();
    let (device, _runner) = Device::new(&state, serial.reader(), serial.writer(), test_config());

    let result = block_on(Dns::get_host_by_name(&device, "example.com", AddrType::IPv6));
    assert_eq!(Err(Error::FamilyNotSupported), result);

    let mut buffer = [0x0; 32];
    let address = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
    let result = block_on(Dns::get_host_by_address(&device, address, &mut buffer));
    assert_eq!(Err(Error::NotSupported), result);
}
