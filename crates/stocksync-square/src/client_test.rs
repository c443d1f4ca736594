use super::*;

fn test_client(base_url: &str) -> SquareClient {
    SquareClient::with_base_url("sq0atp-test", base_url, 30, "stocksync-test/0.1")
        .expect("client construction should not fail")
}

#[test]
fn endpoint_joins_onto_base_url() {
    let client = test_client("https://connect.squareup.com");
    assert_eq!(
        client.endpoint("v2/catalog/list").unwrap().as_str(),
        "https://connect.squareup.com/v2/catalog/list"
    );
}

#[test]
fn endpoint_keeps_base_path_segment() {
    let client = test_client("http://127.0.0.1:4000/square/");
    assert_eq!(
        client.endpoint("v2/locations").unwrap().as_str(),
        "http://127.0.0.1:4000/square/v2/locations"
    );
}

#[test]
fn rejects_unparsable_base_url() {
    let result = SquareClient::with_base_url("t", "not a url", 5, "ua");
    assert!(matches!(result, Err(SquareError::InvalidBaseUrl { .. })));
}
