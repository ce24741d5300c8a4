#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use esp_backtrace as _;
use esp_hal::rng::{Trng, TrngSource};
use esp_hal::timer::timg::TimerGroup;
use nus_link_firmware::ble;
use nus_link_firmware::config::RoleConfig;
use nus_link_firmware::nus::RxEvent;
use static_cell::StaticCell;
use trouble_host::prelude::ExternalController;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

type BleController = ExternalController<esp_radio::ble::controller::BleConnector<'static>, 10>;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    // BLE requires significant heap
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Scheduler must run before any async operation
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let _trng_source = TrngSource::new(peripherals.RNG, peripherals.ADC1);
    let trng = Trng::try_new().expect("TRNG source is alive");

    let radio_controller = RADIO_CONTROLLER.init(esp_radio::init().expect("Failed to initialize esp-radio"));
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    )
    .expect("Failed to initialize BLE connector");
    let controller: BleController = ExternalController::new(ble_connector);

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(peripheral_task(controller, trng));
    })
}

/// NUS peripheral, logging every byte the central writes to RX
#[embassy_executor::task]
async fn peripheral_task(controller: BleController, mut trng: Trng) {
    let on_rx = |event: RxEvent<'_>| {
        log::info!("[nus] received {:02X?}", event.data);
    };
    ble::peripheral::run(controller, &mut trng, RoleConfig::peripheral(), on_rx).await;
}
