//! Wi-Fi station link
//!
//! Association covers the radio connect and DHCP; the link only counts as up
//! once the station is connected and the stack has an IPv4 configuration.

use embassy_net::Stack;
use esp_radio::wifi::{ScanConfig, WifiController, WifiError};
use log::{debug, info};

use atmo_core::error::detail;
use atmo_core::{Link, LinkFailure};

fn association_failed(e: WifiError) -> LinkFailure {
    LinkFailure::Association(detail(format_args!("{:?}", e)))
}

pub struct WifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    ssid: &'static str,
    /// Signal strength of our access point, sampled after each association
    rssi: Option<i32>,
}

impl WifiLink {
    /// `controller` must already carry the station configuration.
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>, ssid: &'static str) -> Self {
        Self {
            controller,
            stack,
            ssid,
            rssi: None,
        }
    }

    async fn measure_rssi(&mut self) -> Option<i32> {
        let config = ScanConfig::default().with_ssid(self.ssid).with_max(1);
        match self.controller.scan_with_config_async(config).await {
            Ok(access_points) => access_points
                .iter()
                .find(|ap| ap.ssid == self.ssid)
                .map(|ap| i32::from(ap.signal_strength)),
            Err(e) => {
                debug!("RSSI scan failed: {:?}", e);
                None
            }
        }
    }
}

impl Link for WifiLink {
    async fn associate(&mut self) -> Result<(), LinkFailure> {
        if !self.controller.is_started().unwrap_or(false) {
            self.controller
                .start_async()
                .await
                .map_err(association_failed)?;
        }

        if let Err(e) = self.controller.connect_async().await {
            let _ = self.controller.disconnect_async().await;
            return Err(association_failed(e));
        }

        self.stack.wait_config_up().await;
        if let Some(config) = self.stack.config_v4() {
            info!("Wi-Fi {} up, address {}", self.ssid, config.address);
        }

        self.rssi = self.measure_rssi().await;
        Ok(())
    }

    fn is_up(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }

    fn signal_strength(&self) -> Option<i32> {
        self.rssi
    }
}
