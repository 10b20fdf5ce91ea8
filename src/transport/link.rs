//! Network attachment.
//!
//! A [`Link`] gets the host onto a network before any socket is opened: joining
//! a wireless network, raising an access point, or nothing at all when the
//! operating system already manages connectivity. The peer drives it through
//! `attach`, then polls `is_connected` until the link is confirmed or the poll
//! budget runs out.

use std::future::Future;

use tokio::process::Command;

use super::config::LinkSettings;
use super::error::PeerError;

/// Network attachment backend.
pub trait Link {
    /// Start bringing the link up according to `settings`.
    fn attach(
        &mut self,
        settings: &LinkSettings,
    ) -> impl Future<Output = Result<(), PeerError>> + Send;

    /// Whether the link is currently up.
    fn is_connected(&mut self) -> impl Future<Output = Result<bool, PeerError>> + Send;

    /// Tear the link down.
    fn detach(&mut self) -> impl Future<Output = Result<(), PeerError>> + Send;
}

/// Connectivity managed by the host OS; always attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostLink;

impl Link for HostLink {
    async fn attach(&mut self, _settings: &LinkSettings) -> Result<(), PeerError> {
        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool, PeerError> {
        Ok(true)
    }

    async fn detach(&mut self) -> Result<(), PeerError> {
        Ok(())
    }
}

/// Wireless link driven through NetworkManager's `nmcli`.
#[derive(Debug, Clone)]
pub struct WifiLink {
    station: String,
    access_point: String,
    active: Vec<String>,
}

impl WifiLink {
    /// Use `station` to join networks and `access_point` to host one.
    pub fn new(station: impl Into<String>, access_point: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            access_point: access_point.into(),
            active: Vec::new(),
        }
    }
}

impl Link for WifiLink {
    async fn attach(&mut self, settings: &LinkSettings) -> Result<(), PeerError> {
        nmcli(&["radio", "wifi", "on"]).await?;

        if settings.enable_ap {
            log::info!("Enabling access point on {}", self.access_point);
            nmcli(&["device", "wifi", "hotspot", "ifname", &self.access_point]).await?;
            self.active.push(self.access_point.clone());
        }

        if let Some(creds) = &settings.credentials {
            log::info!("Joining network {:?} on {}", creds.ssid, self.station);

            // Rescans are rate limited and a fresh interface has nothing to drop.
            if let Err(e) = nmcli(&["device", "wifi", "rescan", "ifname", &self.station]).await {
                log::debug!("rescan skipped: {e}");
            }
            if let Err(e) = nmcli(&["device", "disconnect", &self.station]).await {
                log::debug!("disconnect skipped: {e}");
            }

            let mut args = vec!["device", "wifi", "connect", creds.ssid.as_str()];
            if let Some(password) = &creds.password {
                args.extend(["password", password.as_str()]);
            }
            args.extend(["ifname", self.station.as_str()]);
            nmcli(&args).await?;
            self.active.push(self.station.clone());
        }

        Ok(())
    }

    async fn is_connected(&mut self) -> Result<bool, PeerError> {
        let output = nmcli(&["-t", "-f", "DEVICE,STATE", "device"]).await?;
        Ok(parse_connected(
            &output,
            &[self.station.as_str(), self.access_point.as_str()],
        ))
    }

    async fn detach(&mut self) -> Result<(), PeerError> {
        let devices = std::mem::take(&mut self.active);
        disconnect_all(devices, |device| async move {
            nmcli(&["device", "disconnect", &device]).await.map(drop)
        })
        .await
    }
}

/// Disconnect every device, even after a failure. Returns the first error.
async fn disconnect_all<R, Fut>(devices: Vec<String>, mut disconnect: R) -> Result<(), PeerError>
where
    R: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(), PeerError>>,
{
    let mut first = None;
    for device in devices {
        if let Err(e) = disconnect(device.clone()).await {
            log::warn!("Failed to disconnect {device}: {e}");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

async fn nmcli(args: &[&str]) -> Result<String, PeerError> {
    let output = Command::new("nmcli")
        .args(args)
        .output()
        .await
        .map_err(|e| PeerError::Link(format!("failed to run nmcli: {e}")))?;

    if !output.status.success() {
        return Err(PeerError::Link(format!(
            "nmcli {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether any of `devices` reports `connected` in `nmcli -t -f DEVICE,STATE` output.
fn parse_connected(output: &str, devices: &[&str]) -> bool {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(device, state)| devices.contains(&device) && state.trim() == "connected")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_link_always_attached() {
        let mut link = HostLink;
        link.attach(&LinkSettings::default()).await.unwrap();
        assert!(link.is_connected().await.unwrap());
        link.detach().await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_all_continues_past_failures() {
        let devices = vec!["wlan0".to_string(), "wlan1".to_string(), "wlan2".to_string()];
        let mut tried = Vec::new();

        let err = disconnect_all(devices, |device| {
            tried.push(device.clone());
            async move {
                if device == "wlan2" {
                    Ok(())
                } else {
                    Err(PeerError::Link(format!("{device} busy")))
                }
            }
        })
        .await
        .unwrap_err();

        assert_eq!(tried, ["wlan0", "wlan1", "wlan2"]);
        assert!(matches!(err, PeerError::Link(msg) if msg == "wlan0 busy"));
    }

    #[tokio::test]
    async fn test_disconnect_all_succeeds_when_every_device_does() {
        let res = disconnect_all(vec!["wlan0".to_string()], |_| async { Ok(()) }).await;
        assert!(res.is_ok());
    }

    #[test]
    fn test_parse_connected() {
        let output = "wlan0:connected\nwlan1:disconnected\nlo:connected (externally)\n";
        assert!(parse_connected(output, &["wlan0", "wlan1"]));
        assert!(!parse_connected(output, &["wlan1"]));
        assert!(!parse_connected(output, &["lo"]));
    }

    #[test]
    fn test_parse_connected_ignores_partial_states() {
        let output = "wlan0:connecting (getting IP configuration)\n";
        assert!(!parse_connected(output, &["wlan0"]));
        assert!(!parse_connected("", &["wlan0"]));
    }
}
