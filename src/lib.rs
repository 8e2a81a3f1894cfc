//! Client for myenergi hubs and the devices behind them (Eddi diverters, Zappi chargers).
//!
//! The hub only accepts HTTP Digest authentication (RFC 2617, with the RFC 7616 hash
//! algorithms). Every logical call sends an unauthenticated probe, answers the 401
//! challenge once and returns whatever the authenticated retry produced. Device payloads
//! use terse keys (`che`, `sta`, `zmo`...) and are turned into [`NormalizedReading`]s.
//!
//! # Examples
//!
//! Answering a challenge by hand:
//!
//! ```
//! use myenergi::{AuthContext, AuthorizationHeader, ClientNonce, Credentials};
//!
//! // Value from the WWW-Authenticate HTTP header of a 401 response
//! let www_authenticate = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
//!
//! let credentials = Credentials::new("Mufasa", "Circle Of Life");
//! let context = AuthContext::new(&credentials, "/dir/index.html");
//!
//! let challenge = myenergi::parse(www_authenticate).unwrap();
//!
//! // The cnonce is random unless given explicitly
//! let answer = AuthorizationHeader::from_challenge(&challenge, &context, ClientNonce::with_cnonce("0a4f113b"));
//! assert_eq!(answer.response, "6629fae49393a05397450978507c4ef1");
//! ```
//!
//! Talking to a hub:
//!
//! ```no_run
//! use myenergi::{DeviceGateway, DeviceKind, GatewayConfig};
//!
//! # async fn run() -> myenergi::Result<()> {
//! let gateway = DeviceGateway::from_config(&GatewayConfig::new("10088888", "app-password"))?;
//! let reading = gateway.fetch_reading(DeviceKind::Zappi, "16186743").await?;
//! println!("{} kWh this session, {}", reading.charge_rate_kwh, reading.status_text);
//! # Ok(())
//! # }
//! ```

mod challenge;
mod client;
mod config;
mod digest;
mod enums;
mod error;
mod gateway;
pub mod telemetry;
mod utils;

pub use error::{Error, Result};

pub use crate::challenge::Challenge;
pub use crate::client::{AuthenticatedHttpClient, HttpTransport, ReqwestTransport};
pub use crate::config::{defaults, envvars, GatewayConfig};
pub use crate::digest::{AuthContext, AuthorizationHeader, ClientNonce, Credentials, NONCE_COUNT};
pub use crate::enums::*;
pub use crate::gateway::{
    status_path, ControlCommand, DeviceGateway, FetchOutcome, HubSnapshot, ZappiBoost, ZappiMode,
};
pub use crate::telemetry::{normalize, DeviceKind, NormalizedReading, ReadingDetails};

/// Parse the WWW-Authenticate header value.
/// It's just a convenience method to call [`Challenge::parse()`].
pub fn parse(www_authenticate: &str) -> Result<Challenge> {
    Challenge::parse(www_authenticate)
}

#[test]
fn test_parse_respond() {
    let src = r#"
    Digest
       realm="http-auth@example.org",
       qop="auth, auth-int",
       algorithm=MD5,
       nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
       opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
    "#;

    let credentials = Credentials::new("Mufasa", "Circle of Life");
    let context = AuthContext::new(&credentials, "/dir/index.html");

    let prompt = crate::parse(src).unwrap();
    let answer = AuthorizationHeader::from_challenge(
        &prompt,
        &context,
        ClientNonce::with_cnonce("f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ"),
    );

    let str = answer.to_string().replace(", ", ",\n  ");

    assert_eq!(
        str,
        r#"
Digest username="Mufasa",
  realm="http-auth@example.org",
  nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
  uri="/dir/index.html",
  qop=auth,
  nc=00000001,
  cnonce="f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ",
  response="8ca523f5e9506fed4657c9700eebdbec",
  opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
"#
        .trim()
    );
}
