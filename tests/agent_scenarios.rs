//! End-to-end scenarios against the scripted driver and models.

use std::time::Duration;
use webpilot::agent::WebAgent;
use webpilot::dom::{DomSnapshot, ElementNode};
use webpilot::driver::{Driver, MockDriver};
use webpilot::engine::NavigationEngine;
use webpilot::llm::StaticModel;
use webpilot::retrieval::Bm25Ranker;
use webpilot::trajectory::{ActionOutput, ActionStatus, NavigationCommand, RunStatus, Trajectory};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn search_page() -> DomSnapshot {
    let body = ElementNode::new("body").with_children(vec![
        ElementNode::new("form").with_children(vec![
            ElementNode::new("input")
                .with_attribute("placeholder", "Search crates")
                .visible(),
            ElementNode::new("button").with_text("Search").visible(),
        ]),
    ]);
    DomSnapshot::new(ElementNode::new("html").with_children(vec![body]))
}

fn results_page() -> DomSnapshot {
    let body = ElementNode::new("body").with_children(vec![
        ElementNode::new("h1").with_text("Results for rust"),
        ElementNode::new("a")
            .with_attribute("href", "/crates/rust")
            .with_text("rust")
            .visible(),
    ]);
    DomSnapshot::new(ElementNode::new("html").with_children(vec![body]))
}

#[test]
fn search_objective_completes_with_two_outputs() {
    init_logging();
    let driver = MockDriver::new(search_page());
    driver.queue_snapshot(results_page());

    let planner = StaticModel::new(vec![
        "Thoughts: the search form is visible\nNext engine: NAVIGATION_ENGINE\nInstruction: Search for rust",
        "Thoughts: results are shown\nNext engine: STOP\nInstruction: [NONE]",
    ]);
    let actor = StaticModel::new(vec![
        "```yaml\n- navigation_command: set_value\n  xpath: \"/html/body/form/input\"\n  value: rust\n- navigation_command: click\n  xpath: \"/html/body/form/button\"\n```",
    ]);

    let mut agent = WebAgent::new(Box::new(driver), Box::new(planner), Box::new(actor))
        .time_between_actions(Duration::ZERO);
    let trajectory = agent.run("https://crates.example/", "Search for rust");

    assert_eq!(trajectory.status, RunStatus::Completed);
    assert_eq!(trajectory.actions.len(), 1);
    let action = &trajectory.actions[0];
    assert_eq!(action.status, ActionStatus::Completed);
    assert_eq!(action.action_output.len(), 2);
    match (&action.action_output[0], &action.action_output[1]) {
        (ActionOutput::WebNavigation(first), ActionOutput::WebNavigation(second)) => {
            assert_eq!(first.navigation_command, NavigationCommand::SetValue);
            assert_eq!(first.value.as_deref(), Some("rust"));
            assert_eq!(second.navigation_command, NavigationCommand::Click);
        }
        other => panic!("unexpected outputs: {other:?}"),
    }
}

#[test]
fn extraction_step_lands_in_memory_and_trajectory() {
    init_logging();
    let driver = MockDriver::new(results_page());
    let planner = StaticModel::new(vec![
        "Next engine: EXTRACTION_ENGINE\nInstruction: What is the first result?",
        "Next engine: STOP\nInstruction: [NONE]",
    ]);
    let actor = StaticModel::new(vec!["rust"]);

    let mut agent = WebAgent::new(Box::new(driver), Box::new(planner), Box::new(actor))
        .time_between_actions(Duration::ZERO);
    let trajectory = agent.run("https://crates.example/search?q=rust", "Name the first result");

    assert_eq!(trajectory.status, RunStatus::Completed);
    assert_eq!(trajectory.actions.len(), 1);
    match &trajectory.actions[0].action_output[0] {
        ActionOutput::WebExtraction(out) => assert_eq!(out.text, "rust"),
        other => panic!("unexpected output: {other:?}"),
    }
}

#[test]
fn out_of_context_element_is_never_executed() {
    init_logging();
    // The link exists in the DOM but is invisible, so retrieval never
    // offers it; a model insisting on it gets rejected every attempt
    let body = ElementNode::new("body").with_children(vec![
        ElementNode::new("button").with_text("Visible").visible(),
        ElementNode::new("a")
            .with_attribute("href", "/secret")
            .with_text("Hidden link"),
    ]);
    let page = DomSnapshot::new(ElementNode::new("html").with_children(vec![body]));
    let driver = MockDriver::new(page);
    let actor = StaticModel::new(vec![
        "```yaml\n- navigation_command: click\n  xpath: \"/html/body/a\"\n```",
        "```yaml\n- navigation_command: click\n  xpath: \"/html/body/a\"\n```",
    ]);

    let engine = NavigationEngine::new(&driver, &actor, Box::new(Bm25Ranker::default()))
        .n_attempts(2)
        .time_between_actions(Duration::ZERO);
    let result = engine.execute_instruction("Open the hidden link", None).unwrap();

    assert!(!result.success);
    assert!(driver.executed().is_empty());
}

#[test]
fn frame_round_trip_restores_focus_across_nested_frames() {
    let button = ElementNode::new("button").with_text("Deep").visible();
    let inner_frame = ElementNode::new("iframe").with_children(vec![ElementNode::new("html")
        .with_children(vec![ElementNode::new("body").with_children(vec![button])])]);
    let outer_frame = ElementNode::new("iframe").with_children(vec![ElementNode::new("html")
        .with_children(vec![ElementNode::new("body").with_children(vec![inner_frame])])]);
    let page = DomSnapshot::new(ElementNode::new("html").with_children(vec![
        ElementNode::new("body").with_children(vec![outer_frame]),
    ]));
    let driver = MockDriver::new(page);

    let xpath = "/html/body/iframe/html/body/iframe/html/body/button";
    {
        let node = webpilot::driver::resolve_xpath(&driver, xpath).unwrap();
        assert_eq!(driver.focus_depth(), 2);
        assert_eq!(node.xpath(), xpath);
    }
    assert_eq!(driver.focus_depth(), 0);

    // Zero frames round-trips too
    let plain = DomSnapshot::new(ElementNode::new("html").with_children(vec![
        ElementNode::new("body").with_children(vec![ElementNode::new("button").visible()]),
    ]));
    let driver = MockDriver::new(plain);
    {
        webpilot::driver::resolve_xpath(&driver, "/html/body/button").unwrap();
        assert_eq!(driver.focus_depth(), 0);
    }
    assert_eq!(driver.focus_depth(), 0);
}

#[test]
fn trajectory_round_trips_through_json() {
    init_logging();
    let driver = MockDriver::new(search_page());
    let planner = StaticModel::new(vec![
        "Next engine: NAVIGATION_CONTROLS\nInstruction: SCROLL_DOWN",
        "Next engine: STOP\nInstruction: [NONE]",
    ]);
    let mut agent = WebAgent::new(
        Box::new(driver),
        Box::new(planner),
        Box::new(StaticModel::new(vec![])),
    )
    .time_between_actions(Duration::ZERO);
    let trajectory = agent.run("https://example.com", "scroll once");

    let json = trajectory.to_json().unwrap();
    assert!(json.contains("\"navigation_command\": \"scroll\""));
    let back = Trajectory::from_json(&json).unwrap();
    assert_eq!(trajectory, back);
}

#[test]
fn replayed_trajectory_repeats_recorded_commands() {
    init_logging();
    let driver = MockDriver::new(search_page());
    driver.queue_snapshot(results_page());
    let planner = StaticModel::new(vec![
        "Next engine: NAVIGATION_ENGINE\nInstruction: Search for rust",
        "Next engine: STOP\nInstruction: [NONE]",
    ]);
    let actor = StaticModel::new(vec![
        "```yaml\n- navigation_command: set_value_and_enter\n  xpath: \"/html/body/form/input\"\n  value: rust\n```",
    ]);
    let mut agent = WebAgent::new(Box::new(driver), Box::new(planner), Box::new(actor))
        .time_between_actions(Duration::ZERO);
    let trajectory = agent.run("https://crates.example/", "Search for rust");
    assert_eq!(trajectory.status, RunStatus::Completed);

    // Replay against a fresh page with the same layout, no model involved
    let fresh = MockDriver::new(search_page());
    webpilot::exporter::replay(&trajectory, &fresh).unwrap();
    let executed = fresh.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].navigation_command,
        NavigationCommand::SetValueAndEnter
    );
    assert_eq!(fresh.get_url().unwrap(), "https://crates.example/");
}
