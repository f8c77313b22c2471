#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::Instant;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiDevice};
use log::{error, info, warn};
use static_cell::StaticCell;

use atmo_core::sensors::SHT40Sensor;
use atmo_core::{Agent, WireFormat};
use atmo_firmware::{HttpTransport, Mq135Adc, WifiLink, settings};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
// DHCP, DNS and one TCP socket
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let mut config = settings::agent_config();
    info!("atmo-rs {} starting", config.sensor_id);

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Network
    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (mut controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi controller");

    if config.internet.ssid.is_empty() {
        warn!("ATMO_WIFI_SSID is not set, the link will never come up");
    }
    let client = ClientConfig::default()
        .with_ssid(config.internet.ssid.into())
        .with_password(config.internet.password.into());
    if let Err(e) = controller.set_config(&ModeConfig::Client(client)) {
        error!("Wi-Fi station config rejected: {:?}", e);
    }

    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        Instant::now().as_ticks(),
    );
    spawner.spawn(net_task(runner).expect("Failed to spawn network task"));

    // Sensors: SHT40 on I2C0 (SDA GPIO12, SCL GPIO11), MQ135 on GPIO1
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .expect("Failed to configure I2C0")
    .with_sda(peripherals.GPIO12)
    .with_scl(peripherals.GPIO11)
    .into_async();
    let climate = SHT40Sensor::new(i2c);

    let mut adc_config = AdcConfig::new();
    let mq135_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let gas = Mq135Adc::new(Adc::new(peripherals.ADC1, adc_config), mq135_pin);

    if config.wire_format == WireFormat::MessageBus {
        warn!("No message-bus client on this build, posting HTTP records instead");
        config.wire_format = WireFormat::Http;
    }
    let link = WifiLink::new(controller, stack, config.internet.ssid);
    let transport = HttpTransport::new(stack, config.collector.endpoint(), config.network_timeout());

    let mut agent = Agent::from_config(climate, gas, link, transport, &config);
    agent.run().await
}
