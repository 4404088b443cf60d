//! Verify normalization and decoding against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Payloads are compared as JSON values so the vectors stay readable and
//! field order does not matter.

use bytes::Bytes;
use cloak_core::{from_native, to_native_payload, Body, Config, HostRequest, IoData, OptionValue};
use serde_json::Value;

const OPTIONS: [&str; 4] = ["impersonate", "insecure_skip_verify", "max_body_size", "cookie_jar"];

fn option_value(value: &Value) -> OptionValue {
    match value {
        Value::Null => OptionValue::Nil,
        Value::Bool(b) => OptionValue::Bool(*b),
        Value::Number(n) => OptionValue::Int(n.as_i64().unwrap()),
        Value::String(s) => OptionValue::Str(s.clone()),
        Value::Object(map) => OptionValue::atom(map["atom"].as_str().unwrap()),
        Value::Array(items) => OptionValue::List(items.iter().map(option_value).collect()),
    }
}

fn iodata(value: &Value) -> IoData {
    match value {
        Value::String(s) => IoData::from(s.as_str()),
        Value::Number(n) => IoData::Byte(n.as_i64().unwrap()),
        Value::Array(items) => IoData::List(items.iter().map(iodata).collect()),
        other => panic!("not iodata: {other}"),
    }
}

fn body(value: &Value) -> Body {
    match value {
        Value::Null => Body::None,
        Value::String(s) => Body::from(s.as_str()),
        Value::Object(map) if map.contains_key("iodata") => {
            Body::IoData(map["iodata"].as_array().unwrap().iter().map(iodata).collect())
        }
        Value::Object(map) if map.contains_key("stream") => {
            Body::Stream(cloak_core::BodyStream::new(std::iter::once(Bytes::from_static(b"chunk"))))
        }
        other => panic!("unknown body: {other}"),
    }
}

fn host_request(input: &Value) -> HostRequest {
    let method = input["method"].as_str().unwrap();
    let url = input["url"].as_str().unwrap();
    let mut request = HostRequest::new(method, url)
        .register_options(OPTIONS)
        .body(body(&input["body"]));

    for entry in input["headers"].as_array().unwrap() {
        let name = entry[0].as_str().unwrap();
        for value in entry[1].as_array().unwrap() {
            request = request.header(name, value.as_str().unwrap());
        }
    }

    let options: Vec<(String, OptionValue)> = input["options"]
        .as_object()
        .unwrap()
        .iter()
        .map(|(name, value)| (name.clone(), option_value(value)))
        .collect();
    request.merge_options(options).unwrap()
}

#[test]
fn normalize_test_vectors() {
    let raw = include_str!("../../test-vectors/normalize.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let request = host_request(&case["request"]);
        let result = to_native_payload(&request, &Config::default());

        if let Some(expected) = case.get("expected_error") {
            let err = result.expect_err(name);
            assert_eq!(err.kind.as_str(), expected["kind"], "{name}: kind");
            assert_eq!(err.message, expected["message"], "{name}: message");
            if let Some(details) = expected.get("details") {
                for (key, value) in details.as_object().unwrap() {
                    assert_eq!(&err.details[key], value, "{name}: details.{key}");
                }
            }
            continue;
        }

        let (payload, body) = result.unwrap_or_else(|e| panic!("{name}: {e}"));
        let payload = serde_json::to_value(&payload).unwrap();
        assert_eq!(payload, case["expected_payload"], "{name}: payload");
        let expected_body = case["expected_body"].as_str().map(|s| s.as_bytes().to_vec());
        assert_eq!(body.map(|b| b.to_vec()), expected_body, "{name}: body");
    }
}

#[test]
fn decode_test_vectors() {
    let raw = include_str!("../../test-vectors/decode.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let body = case["body"].as_str().unwrap().as_bytes().to_vec();
        let result = from_native(&case["metadata"], body);

        if let Some(expected) = case.get("expected_error") {
            let err = result.expect_err(name);
            assert_eq!(err.kind.as_str(), expected["kind"], "{name}: kind");
            continue;
        }

        let response = result.unwrap_or_else(|e| panic!("{name}: {e}"));
        let expected = &case["expected_response"];
        let headers = serde_json::to_value(&response.headers).unwrap();
        let body = expected["body"].as_str().unwrap().as_bytes();
        let status = expected["status"].as_u64().unwrap();
        assert_eq!(u64::from(response.status), status, "{name}: status");
        assert_eq!(headers, expected["headers"], "{name}: headers");
        assert_eq!(response.body.as_ref(), body, "{name}: body");
        assert_eq!(response.final_url(), expected["url"].as_str(), "{name}: url");
    }
}
