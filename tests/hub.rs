use md5::{Digest, Md5};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use myenergi::{
    ControlCommand, DeviceGateway, DeviceKind, Error, GatewayConfig, ReadingDetails, ZappiMode,
};

const CHALLENGE: &str = r#"Digest realm="MyEnergi", nonce="abc123""#;

fn md5_hex(s: &str) -> String {
    hex::encode(Md5::digest(s.as_bytes()))
}

fn gateway(server: &ServerGuard, password: &str) -> DeviceGateway {
    let mut config = GatewayConfig::new("HUBSN001", password);
    config.base_url = server.url();
    config.timeout_secs = 5;
    config.eddi_serial = Some("123".into());
    config.zappi_serial = Some("456".into());
    DeviceGateway::from_config(&config).unwrap()
}

#[tokio::test]
async fn probe_then_authenticated_fetch() {
    let mut server = Server::new_async().await;

    let probe = server
        .mock("GET", "/cgi-jstatus-E123")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header("www-authenticate", CHALLENGE)
        .expect(1)
        .create_async()
        .await;

    let ha1 = md5_hex("HUBSN001:MyEnergi:secret");
    let ha2 = md5_hex("GET:/cgi-jstatus-E123");
    let expected = format!(
        r#"Digest username="HUBSN001", realm="MyEnergi", nonce="abc123", uri="/cgi-jstatus-E123", response="{}""#,
        md5_hex(&format!("{}:abc123:{}", ha1, ha2))
    );

    let authed = server
        .mock("GET", "/cgi-jstatus-E123")
        .match_header("authorization", expected.as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"eddi":[{"che":3.2,"sta":1,"tim":"12:00","dat":"01-01-2024"}]}"#)
        .expect(1)
        .create_async()
        .await;

    let reading = gateway(&server, "secret")
        .fetch_reading(DeviceKind::Eddi, "123")
        .await
        .unwrap();

    assert_eq!(reading.charge_rate_kwh, 3.2);
    assert_eq!(reading.status_code, 1);
    assert_eq!(reading.timestamp, "12:00 01-01-2024");

    probe.assert_async().await;
    authed.assert_async().await;
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let mut server = Server::new_async().await;

    let probe = server
        .mock("GET", "/cgi-jstatus-Z456")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header("www-authenticate", CHALLENGE)
        .expect(1)
        .create_async()
        .await;
    let retry = server
        .mock("GET", "/cgi-jstatus-Z456")
        .match_header("authorization", Matcher::Regex("^Digest ".into()))
        .with_status(401)
        .with_header("www-authenticate", CHALLENGE)
        .expect(1)
        .create_async()
        .await;

    let err = gateway(&server, "wrong")
        .fetch_raw(DeviceKind::Zappi, "456")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthenticationFailed(_)));
    probe.assert_async().await;
    retry.assert_async().await;
}

#[tokio::test]
async fn snapshot_reports_each_device() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/cgi-jstatus-E123")
        .with_status(200)
        .with_body(r#"{"eddi":[{"che":1.5,"sta":3,"div":2300}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/cgi-jstatus-Z456")
        .with_status(401)
        .create_async()
        .await;

    let snapshot = gateway(&server, "secret").snapshot().await;

    assert!(snapshot.eddi.success);
    let eddi = snapshot.eddi.reading.unwrap();
    assert_eq!(eddi.status_text, "Diverting");
    assert!(matches!(eddi.details, ReadingDetails::Eddi { diverted_w: 2300, .. }));

    assert!(!snapshot.zappi.success);
    assert!(snapshot.zappi.reading.is_none());
    assert!(snapshot.zappi.error.unwrap().contains("WWW-Authenticate"));
}

#[tokio::test]
async fn all_devices_payload() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/cgi-jstatus-*")
        .with_status(200)
        .with_body(
            json!([
                {"eddi": [{"sno": 123, "sta": 1}]},
                {"zappi": [{"sno": 456, "zmo": 3, "pha": 1}]},
                {"harvi": []},
                {"asn": "s18.myenergi.net"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let readings = gateway(&server, "secret").fetch_all_readings().await.unwrap();

    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].device_kind, DeviceKind::Eddi);
    assert_eq!(readings[1].serial.as_deref(), Some("456"));
    assert!(matches!(
        readings[1].details,
        ReadingDetails::Zappi { ref mode_text, ref phase, .. } if mode_text == "Eco+" && phase == "1"
    ));
}

#[tokio::test]
async fn control_command_with_qop() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/cgi-zappi-mode-Z456-1-0-0-0000")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header(
            "www-authenticate",
            r#"Digest realm="MyEnergi", nonce="n2", qop="auth", opaque="op""#,
        )
        .expect(1)
        .create_async()
        .await;
    let authed = server
        .mock("GET", "/cgi-zappi-mode-Z456-1-0-0-0000")
        .match_header(
            "authorization",
            Matcher::Regex(
                r#"^Digest username="HUBSN001", realm="MyEnergi", nonce="n2", uri="/cgi-zappi-mode-Z456-1-0-0-0000", qop=auth, nc=00000001, cnonce="[0-9a-f]{32}", response="[0-9a-f]{32}", opaque="op"$"#
                    .into(),
            ),
        )
        .with_status(200)
        .with_body(r#"{"zsh":0,"status":0,"statusText":""}"#)
        .expect(1)
        .create_async()
        .await;

    let ack = gateway(&server, "secret")
        .send_command(&ControlCommand::zappi_mode("456", ZappiMode::Fast))
        .await
        .unwrap();

    assert_eq!(ack["status"], 0);
    authed.assert_async().await;
}

#[tokio::test]
async fn connection_failure_is_transport_error() {
    let mut config = GatewayConfig::new("HUBSN001", "secret");
    config.base_url = "http://127.0.0.1:1".into();
    config.timeout_secs = 2;

    let err = DeviceGateway::from_config(&config)
        .unwrap()
        .fetch_raw(DeviceKind::Eddi, "123")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_transient());
}
