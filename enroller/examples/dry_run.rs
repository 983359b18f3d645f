//! Dry run of the default signup pipeline against the scripted backends.
//!
//! ```bash
//! RUST_LOG=enroller=debug cargo run --example dry_run
//! ```

use enroller::pipeline::RunConfig;
use enroller::process::MemoryStore;
use enroller::simulation::{ScriptedControl, ScriptedDriver, ScriptedScreen, SimulatedPointer};
use enroller::{ProcessStore, RunParameters, Session};
use std::sync::Arc;
use std::time::Duration;

fn next_button() -> ScriptedControl {
    ScriptedControl::new("button", "Next")
        .answering(&["attr:input[type='submit']"])
        .advances_on_click()
}

fn screens() -> Vec<ScriptedScreen> {
    vec![
        ScriptedScreen::new("https://signup.example/alias")
            .with(
                ScriptedControl::new("input", "New email")
                    .answering(&["attr:input[aria-label='New email'][type='email']"]),
            )
            .with(next_button()),
        ScriptedScreen::new("https://signup.example/password")
            .with(
                ScriptedControl::new("input", "Password")
                    .answering(&["attr:input[type='password']"])
                    .masked_readback(),
            )
            .with(next_button()),
        ScriptedScreen::new("https://signup.example/birthdate")
            .with(
                ScriptedControl::new("button", "Birth month")
                    .answering(&["attr:button[name='BirthMonth']"]),
            )
            .with(ScriptedControl::new("option", "March").sets_value_of("Birth month", "March"))
            .with(
                ScriptedControl::new("button", "Birth day")
                    .answering(&["attr:button[name='BirthDay']"]),
            )
            .with(ScriptedControl::new("option", "14").sets_value_of("Birth day", "14"))
            .with(
                ScriptedControl::new("input", "Birth year")
                    .answering(&["attr:input[name='BirthYear']"]),
            )
            .with(next_button()),
        ScriptedScreen::new("https://signup.example/names")
            .with(
                ScriptedControl::new("input", "First name")
                    .answering(&["attr:input[id='firstNameInput']"]),
            )
            .with(
                ScriptedControl::new("input", "Last name")
                    .answering(&["attr:input[id='lastNameInput']"]),
            )
            .with(next_button()),
        ScriptedScreen::new("https://signup.example/challenge")
            .with(
                ScriptedControl::new("iframe", "Verification challenge")
                    .answering(&["attr:iframe[data-testid='humanCaptchaIframe']"])
                    .at(100.0, 100.0, 300.0, 200.0)
                    .boundary(
                        true,
                        vec![ScriptedControl::new("div", "captcha")
                            .with_id("px-captcha")
                            .answering(&["attr:[id='px-captcha']"])
                            .at(10.0, 20.0, 100.0, 40.0)],
                    ),
            )
            .with(
                ScriptedControl::new("div", "done")
                    .with_id("checkmark")
                    .answering(&["attr:div[id='checkmark']"]),
            )
            .with(ScriptedControl::new("button", "No").advances_on_click()),
        ScriptedScreen::new("https://signup.example/done"),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = Arc::new(MemoryStore::new());
    let session = Session::new(
        Arc::new(ScriptedDriver::new(screens())),
        Arc::new(SimulatedPointer::default()),
        store.clone(),
    )
    .with_config(RunConfig {
        challenge_hold: Duration::from_secs(2),
        challenge_poll: Duration::from_millis(500),
        ..RunConfig::default()
    });

    let params = RunParameters {
        process_id: Some("dry-run".to_string()),
        signup_url: "https://signup.example/alias".to_string(),
        username: "mgarcia1993".to_string(),
        password: "Str0ng!pass".to_string(),
        birth_month: "March".to_string(),
        birth_day: "14".to_string(),
        birth_year: "1993".to_string(),
        first_name: "Maria".to_string(),
        last_name: "Garcia".to_string(),
        case_id: None,
    };

    let terminal = session.run_to_completion(params).await?;
    println!("terminal status: {terminal}");

    if let Some(record) = store.get("dry-run").await? {
        println!("{}", record.to_json()?);
    }
    Ok(())
}
