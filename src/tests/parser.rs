use crate::parser::{FramingError, Parser, Unit, PARSE_BUFFER_SIZE};
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

/// Owned copy of a parse result
#[derive(Debug, PartialEq)]
enum Parsed {
    Prompt,
    Ok,
    Error(Vec<u8>),
    Event(Vec<u8>),
    SocketData(String, Vec<u8>),
    Line(Vec<u8>),
    Framing(FramingError),
}

fn parse(parser: &mut Parser, data: &[u8]) -> Vec<Parsed> {
    let mut parsed = vec![];

    for byte in data {
        match parser.feed(*byte) {
            Ok(None) => {}
            Ok(Some(unit)) => parsed.push(match unit {
                Unit::Prompt => Parsed::Prompt,
                Unit::Ok => Parsed::Ok,
                Unit::Error(line) => Parsed::Error(line.to_vec()),
                Unit::Event(event) => Parsed::Event(event.to_vec()),
                Unit::SocketData { id, data } => Parsed::SocketData(id.to_string(), data.to_vec()),
                Unit::Line(line) => Parsed::Line(line.to_vec()),
            }),
            Err(error) => parsed.push(Parsed::Framing(error)),
        }
    }

    parsed
}

#[test]
fn test_socket_data() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,3,5,hello\r\n");

    assert_eq!(vec![Parsed::SocketData("3".to_string(), b"hello".to_vec())], parsed);
}

#[test]
fn test_socket_data_embedded_line_terminator() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,3,8,ab\r\ncdef\r\n");

    assert_eq!(vec![Parsed::SocketData("3".to_string(), b"ab\r\ncdef".to_vec())], parsed);
}

#[test]
fn test_socket_data_ending_with_line_terminator() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,1,4,ab\r\n\r\nOK\r\n");

    assert_eq!(
        vec![Parsed::SocketData("1".to_string(), b"ab\r\n".to_vec()), Parsed::Ok],
        parsed
    );
}

#[test]
fn test_socket_data_containing_commas() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,2,5,a,b,c\r\n");

    assert_eq!(vec![Parsed::SocketData("2".to_string(), b"a,b,c".to_vec())], parsed);
}

#[test]
fn test_socket_data_longer_then_announced() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,3,2,hello\r\nOK\r\n");

    assert_eq!(vec![Parsed::Framing(FramingError::MalformedEvent), Parsed::Ok], parsed);
}

#[test]
fn test_socket_data_invalid_length() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,3,x,hello\r\n");

    assert_eq!(vec![Parsed::Framing(FramingError::MalformedEvent)], parsed);
}

#[test]
fn test_socket_data_missing_fields() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDown,3\r\n");

    assert_eq!(vec![Parsed::Framing(FramingError::MalformedEvent)], parsed);
}

#[test]
fn test_prompt() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b">");

    assert_eq!(vec![Parsed::Prompt], parsed);
}

#[test]
fn test_prompt_after_empty_line() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"\r\n>OK\r\n");

    assert_eq!(vec![Parsed::Prompt, Parsed::Ok], parsed);
}

#[test]
fn test_command_response() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+WDOMAIN:93.184.216.34\r\nOK\r\n");

    assert_eq!(vec![Parsed::Line(b"+WDOMAIN:93.184.216.34".to_vec()), Parsed::Ok], parsed);
}

#[test]
fn test_error_response() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"ERROR:105\r\nERROR\r\n");

    assert_eq!(
        vec![Parsed::Error(b"ERROR:105".to_vec()), Parsed::Error(b"ERROR".to_vec())],
        parsed
    );
}

#[test]
fn test_event() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"+EVENT:SocketDisconnect,2\r\n");

    assert_eq!(vec![Parsed::Event(b"SocketDisconnect,2".to_vec())], parsed);
}

#[test]
fn test_ok_prefix_is_line() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"OKAY\r\n");

    assert_eq!(vec![Parsed::Line(b"OKAY".to_vec())], parsed);
}

#[test]
fn test_empty_lines_ignored() {
    let mut parser = Parser::new();
    let parsed = parse(&mut parser, b"\r\n\r\n\r\nOK\r\n");

    assert_eq!(vec![Parsed::Ok], parsed);
}

#[test]
fn test_overflow() {
    let mut parser = Parser::new();
    let data = vec![b'a'; PARSE_BUFFER_SIZE + 1];
    let parsed = parse(&mut parser, &data);

    assert_eq!(vec![Parsed::Framing(FramingError::Overflow)], parsed);

    // Parser recovers on the next unit
    let parsed = parse(&mut parser, b"\r\nOK\r\n");
    assert_eq!(vec![Parsed::Ok], parsed);
}

#[test]
fn test_reset_discards_partial_unit() {
    let mut parser = Parser::new();
    assert!(parse(&mut parser, b"+WJAP:1,te").is_empty());

    parser.reset();
    let parsed = parse(&mut parser, b"OK\r\n");

    assert_eq!(vec![Parsed::Ok], parsed);
}
