//! End-to-end runs of the default signup catalog against scripted screens
//! that mimic the real flow, one screen per stage.

use enroller::pipeline::RunConfig;
use enroller::process::MemoryStore;
use enroller::simulation::{ScriptedControl, ScriptedDriver, ScriptedScreen, SimulatedPointer};
use enroller::{ProcessStatus, RunParameters, Session};
use std::sync::Arc;
use std::time::Duration;

fn next_button() -> ScriptedControl {
    ScriptedControl::new("button", "Next")
        .answering(&["attr:input[type='submit']"])
        .advances_on_click()
}

/// The six screens of the observed signup flow, answering the catalog's
/// first-choice strategies.
fn signup_screens() -> Vec<ScriptedScreen> {
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

fn fast_config() -> RunConfig {
    RunConfig {
        resolve_budget: Duration::from_millis(300),
        settle_timeout: Duration::from_millis(50),
        challenge_hold: Duration::from_millis(120),
        challenge_poll: Duration::from_millis(25),
        max_run_time: None,
    }
}

fn session(store: Arc<MemoryStore>) -> Session {
    Session::new(
        Arc::new(ScriptedDriver::new(signup_screens())),
        Arc::new(SimulatedPointer::default()),
        store,
    )
    .with_config(fast_config())
}

fn run_params(id: &str) -> RunParameters {
    RunParameters {
        process_id: Some(id.to_string()),
        signup_url: "https://signup.example/alias".to_string(),
        username: "mgarcia1993".to_string(),
        password: "Str0ng!pass".to_string(),
        birth_month: "March".to_string(),
        birth_day: "14".to_string(),
        birth_year: "1993".to_string(),
        first_name: "Maria".to_string(),
        last_name: "Garcia".to_string(),
        case_id: Some("case-0042".to_string()),
    }
}

#[tokio::test]
async fn full_flow_completes_with_full_progress() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let store = Arc::new(MemoryStore::new());
    let terminal = session(store.clone())
        .run_to_completion(run_params("flow-1"))
        .await
        .unwrap();

    assert_eq!(terminal, ProcessStatus::Completed);

    let record = get_record(&store, "flow-1").await;
    assert_eq!(record.status, ProcessStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(record.stage, "post-verification");
    assert_eq!(record.subject.username, "mgarcia1993");
    assert_eq!(record.subject.case_id.as_deref(), Some("case-0042"));

    let log = record
        .log
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(log.contains("stage 'presence-challenge' complete"));
    assert!(log.contains("challenge hold succeeded"));
    // The secret never reaches the process log.
    assert!(!log.contains("Str0ng!pass"));
    assert!(log.contains("(11 chars)"));
}

#[tokio::test]
async fn started_runs_are_observable_through_status() {
    let store = Arc::new(MemoryStore::new());
    let session = session(store.clone());

    let process_id = session.start(run_params("flow-2"));
    assert_eq!(process_id, "flow-2");

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = session.status(&process_id).await.unwrap() {
            if record.status != ProcessStatus::Pending && record.status != ProcessStatus::Running {
                assert_eq!(record.status, ProcessStatus::Completed);
                assert_eq!(record.progress, 100);
                break;
            }
        }
        assert!(
            std::time::Instant::now() < deadline,
            "run did not reach a terminal status in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn get_record(store: &MemoryStore, id: &str) -> enroller::ProcessRecord {
    use enroller::ProcessStore;
    store.get(id).await.unwrap().expect("record exists")
}
