//! Forwards deployment settings from `.env` into the firmware at compile time.
//!
//! Every `ATMO_*` entry becomes a `rustc-env` variable that
//! `atmo_firmware::settings` picks up with `option_env!`. Keys that are not
//! set fall back to the agent defaults.

fn main() {
    println!("cargo:rustc-link-arg=-Tlinkall.x");
    println!("cargo:rerun-if-changed=.env");

    let entries = match dotenvy::dotenv_iter() {
        Ok(entries) => entries,
        Err(_) => {
            println!("cargo:warning=no .env file found, building with default settings");
            return;
        }
    };

    for entry in entries {
        let Ok((key, value)) = entry else {
            println!("cargo:warning=skipping unparsable .env line");
            continue;
        };
        if key.starts_with("ATMO_") {
            println!("cargo:rerun-if-env-changed={key}");
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
