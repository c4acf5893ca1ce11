// TiltGuard — Control Surface
//
// HTTP handlers over the shared monitor state. Routing, connection handling
// and request framing belong to the ESP-IDF HTTP server; this module owns
// only the handler semantics: read the live state, apply control writes
// verbatim, and trigger the provisioning reset.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::{Read, Write};

use crate::config::*;
use crate::net::CredentialStore;
use crate::state::SharedState;

/// Extract a named integer field from a form-encoded body. A present field
/// that fails to parse yields the integer-parse default of 0 — the shipped
/// contract accepts it silently rather than rejecting the request.
fn form_int_field(body: &str, name: &str) -> Option<i32> {
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().parse().unwrap_or(0))
}

/// Start the control-surface server. The returned handle must stay alive for
/// the lifetime of the process.
pub fn start(
    state: SharedState,
    creds: Arc<Mutex<CredentialStore>>,
) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfig {
        uri_match_wildcard: true,
        ..Default::default()
    })?;

    // GET /data — pure read of the live state, floats at 2 decimal places.
    let data_state = Arc::clone(&state);
    server.fn_handler("/data", Method::Get, move |req| -> anyhow::Result<()> {
        let json = data_state.lock().unwrap().data_json();
        let mut resp =
            req.into_response(200, Some("OK"), &[("Content-Type", "application/json")])?;
        resp.write_all(json.as_bytes())?;
        Ok(())
    })?;

    // POST /update — apply present fields verbatim to the control flags.
    let update_state = Arc::clone(&state);
    server.fn_handler("/update", Method::Post, move |mut req| -> anyhow::Result<()> {
        let mut buf = [0u8; HTTP_UPDATE_BODY_MAX];
        let mut len = 0;
        while len < buf.len() {
            let n = req.read(&mut buf[len..])?;
            if n == 0 {
                break;
            }
            len += n;
        }
        let body = std::str::from_utf8(&buf[..len]).unwrap_or("");

        let flag = form_int_field(body, "flag");
        let is_monitoring = form_int_field(body, "isMonitoring");
        update_state.lock().unwrap().apply_update(flag, is_monitoring);

        let mut resp = req.into_response(200, Some("OK"), &[("Content-Type", "text/plain")])?;
        resp.write_all(b"Parameters updated")?;
        Ok(())
    })?;

    // GET /reset_wifi — acknowledge, clear stored credentials, restart into
    // the no-credentials provisioning path.
    server.fn_handler("/reset_wifi", Method::Get, move |req| -> anyhow::Result<()> {
        log::warn!("WiFi reset requested over control surface");
        let mut resp = req.into_response(200, Some("OK"), &[("Content-Type", "text/plain")])?;
        resp.write_all(b"Resetting WiFi settings and restarting...")?;
        drop(resp);

        thread::sleep(Duration::from_millis(RESET_ACK_SETTLE_MS));
        creds.lock().unwrap().clear()?;
        crate::restart_device();
    })?;

    // Everything else is a 404 (wildcard matching, registered last).
    server.fn_handler("/*", Method::Get, not_found)?;
    server.fn_handler("/*", Method::Post, not_found)?;

    log::info!("Control surface up on port 80");
    Ok(server)
}

fn not_found(
    req: esp_idf_svc::http::server::Request<&mut esp_idf_svc::http::server::EspHttpConnection>,
) -> anyhow::Result<()> {
    let mut resp = req.into_response(404, Some("Not Found"), &[("Content-Type", "text/plain")])?;
    resp.write_all(b"404 Not Found")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::form_int_field;

    #[test]
    fn parses_both_fields() {
        let body = "flag=1&isMonitoring=0";
        assert_eq!(form_int_field(body, "flag"), Some(1));
        assert_eq!(form_int_field(body, "isMonitoring"), Some(0));
    }

    #[test]
    fn absent_field_is_none() {
        let body = "flag=1";
        assert_eq!(form_int_field(body, "isMonitoring"), None);
        assert_eq!(form_int_field("", "flag"), None);
    }

    #[test]
    fn malformed_value_defaults_to_zero() {
        assert_eq!(form_int_field("flag=banana", "flag"), Some(0));
        assert_eq!(form_int_field("flag=", "flag"), Some(0));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let body = "foo=9&flag=1&bar";
        assert_eq!(form_int_field(body, "flag"), Some(1));
        assert_eq!(form_int_field(body, "foo"), Some(9));
        assert_eq!(form_int_field(body, "bar"), None);
    }

    #[test]
    fn out_of_range_integers_pass_through() {
        assert_eq!(form_int_field("flag=42", "flag"), Some(42));
        assert_eq!(form_int_field("isMonitoring=-1", "isMonitoring"), Some(-1));
    }
}
