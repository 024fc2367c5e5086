use crate::error_codes::{decode, decode_response, describe, DeviceError, UNKNOWN_ERROR, UNPARSABLE_ERROR};
use alloc::string::ToString;

#[test]
fn test_decode_socket_bind_error() {
    let error = decode(b"ERROR:105").unwrap();

    assert_eq!(Some(105), error.code);
    assert_eq!("Socket bind error", error.message);
}

#[test]
fn test_decode_unparsable_code() {
    let error = decode(b"ERROR:xyz").unwrap();

    assert_eq!(None, error.code);
    assert_eq!(UNPARSABLE_ERROR, error.message);
}

#[test]
fn test_decode_without_code() {
    assert_eq!(None, decode(b"ERROR"));
}

#[test]
fn test_decode_code_with_whitespace() {
    assert_eq!(Some(DeviceError::from_code(66)), decode(b"ERROR: 66 "));
}

#[test]
fn test_describe_groups() {
    assert_eq!("The command is not supported", describe(1));
    assert_eq!("The specified AP was not found", describe(69));
    assert_eq!("DNS Failure", describe(98));
}

#[test]
fn test_describe_unknown_code() {
    assert_eq!(UNKNOWN_ERROR, describe(50));
    assert_eq!(UNKNOWN_ERROR, describe(1000));
}

#[test]
fn test_decode_response_prefers_error_line() {
    let error = decode_response(b"ERROR:97", b"ERROR:98");
    assert_eq!(Some(97), error.code);
}

#[test]
fn test_decode_response_falls_back_to_last_line() {
    let error = decode_response(b"ERROR", b"ERROR:98");
    assert_eq!(DeviceError::from_code(98), error);
}

#[test]
fn test_decode_response_without_any_code() {
    let error = decode_response(b"ERROR", b"+WJAP:1");
    assert_eq!(None, error.code);
    assert_eq!(UNPARSABLE_ERROR, error.message);
}

#[test]
fn test_decode_response_ignores_codes_of_response_lines() {
    assert_eq!(DeviceError::unparsable(), decode_response(b"ERROR", b"+WCOUNTRY:4"));
    assert_eq!(DeviceError::unparsable(), decode_response(b"ERROR", b"connect success ConID=1"));
    assert_eq!(DeviceError::unparsable(), decode_response(b"ERROR", b""));
}

#[test]
fn test_display() {
    assert_eq!("Socket bind error (code 105)", DeviceError::from_code(105).to_string());
    assert_eq!(UNPARSABLE_ERROR, decode(b"ERROR:?").unwrap().to_string());
}
