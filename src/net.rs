// TiltGuard — Connectivity Manager
//
// Owns the WiFi link lifecycle: load saved credentials (or fall back to the
// setup access point and wait for the provisioning portal to store some),
// join the network, and report link status to the control loop. Recovery
// from link loss is a full device restart, issued by the control loop.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

use crate::config::*;
use crate::drivers::led::StatusLed;

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

/// NVS-backed store for the saved network credentials. The provisioning
/// portal writes this namespace; the firmware reads it at boot and clears it
/// on /reset_wifi. Credential contents are otherwise opaque to the core.
pub struct CredentialStore {
    nvs: EspNvs<NvsDefault>,
}

impl CredentialStore {
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        Ok(Self {
            nvs: EspNvs::new(partition, NVS_NAMESPACE, true)?,
        })
    }

    pub fn has_saved(&self) -> anyhow::Result<bool> {
        let mut buf = [0u8; 33];
        Ok(self
            .nvs
            .get_str(NVS_KEY_SSID, &mut buf)?
            .is_some_and(|s| !s.is_empty()))
    }

    /// Load (ssid, password). A stored SSID with no password entry is an
    /// open network.
    pub fn load(&self) -> anyhow::Result<Option<(String, String)>> {
        let mut ssid_buf = [0u8; 33];
        let ssid = match self.nvs.get_str(NVS_KEY_SSID, &mut ssid_buf)? {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Ok(None),
        };

        let mut pass_buf = [0u8; 65];
        let pass = self
            .nvs
            .get_str(NVS_KEY_PASS, &mut pass_buf)?
            .unwrap_or("")
            .to_string();

        Ok(Some((ssid, pass)))
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.nvs.remove(NVS_KEY_SSID)?;
        self.nvs.remove(NVS_KEY_PASS)?;
        log::info!("Stored WiFi credentials cleared");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Connectivity manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub struct ConnectivityManager {
    wifi: EspWifi<'static>,
    status: LinkStatus,
}

impl ConnectivityManager {
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            status: LinkStatus::Disconnected,
        }
    }

    /// Blocking boot path: provision if nothing is saved, then join the
    /// stored network. Returns once the link is up.
    ///
    /// The join poll has no upper retry bound — a wrong password or an
    /// unreachable access point stalls here indefinitely, flashing the LED.
    /// Known limitation of the shipped recovery policy.
    pub fn ensure_connectivity(
        &mut self,
        creds: &Mutex<CredentialStore>,
        led: &mut StatusLed,
    ) -> anyhow::Result<()> {
        log::info!("Starting connectivity manager…");

        if !creds.lock().unwrap().has_saved()? {
            log::warn!("No saved WiFi. Starting setup access point…");
            self.run_provisioning(creds)?;
        }

        let (ssid, pass) = creds
            .lock()
            .unwrap()
            .load()?
            .context("credentials missing after provisioning")?;

        self.join(&ssid, &pass, led)
    }

    /// Expose the open setup access point and block until the provisioning
    /// portal stores credentials, or restart on timeout.
    fn run_provisioning(&mut self, creds: &Mutex<CredentialStore>) -> anyhow::Result<()> {
        self.set_status(LinkStatus::Disconnected);

        self.wifi
            .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid: PROVISIONING_AP_SSID
                    .try_into()
                    .map_err(|_| anyhow!("AP SSID too long"))?,
                auth_method: AuthMethod::None,
                ..Default::default()
            }))?;
        self.wifi.start()?;
        log::info!(
            "Setup access point '{}' up — waiting for credentials",
            PROVISIONING_AP_SSID
        );

        let deadline = Instant::now() + Duration::from_millis(PROVISIONING_TIMEOUT_MS);
        while !creds.lock().unwrap().has_saved()? {
            if Instant::now() >= deadline {
                log::error!("Setup failed or timed out. Restarting.");
                crate::restart_device();
            }
            thread::sleep(Duration::from_millis(PROVISIONING_POLL_MS));
        }

        log::info!("Credentials received — leaving setup mode");
        self.wifi.stop()?;
        Ok(())
    }

    /// Join the stored network, polling at a coarse interval and flashing
    /// the LED at ~1 Hz until the link resolves.
    fn join(&mut self, ssid: &str, pass: &str, led: &mut StatusLed) -> anyhow::Result<()> {
        self.set_status(LinkStatus::Connecting);

        let auth_method = if pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| anyhow!("SSID too long"))?,
                password: pass.try_into().map_err(|_| anyhow!("password too long"))?,
                auth_method,
                ..Default::default()
            }))?;
        self.wifi.start()?;

        // Minimum modem power save — keeps the radio responsive enough for
        // the control surface while saving on the always-on budget.
        esp_idf_sys::esp!(unsafe {
            esp_idf_sys::esp_wifi_set_ps(esp_idf_sys::wifi_ps_type_t_WIFI_PS_MIN_MODEM)
        })?;

        self.wifi.connect()?;
        log::info!("Connecting to saved WiFi '{}'…", ssid);

        while !self.wifi.is_connected()? {
            led.flash_connecting();
        }

        self.set_status(LinkStatus::Connected);
        let ip = self.wifi.sta_netif().get_ip_info()?.ip;
        log::info!("Connected! IP: {}", ip);
        Ok(())
    }

    /// Live link probe, evaluated once per control-loop iteration.
    pub fn is_connected(&mut self) -> bool {
        let up = self.wifi.is_connected().unwrap_or(false);
        self.set_status(if up {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        });
        up
    }

    fn set_status(&mut self, status: LinkStatus) {
        if self.status != status {
            log::debug!("Link status: {:?} -> {:?}", self.status, status);
            self.status = status;
        }
    }
}
