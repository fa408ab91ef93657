//! Action script parsing and guarded dispatch.

use filawatch_core::actions::ActionDispatcher;
use filawatch_core::config::ActionScripts;
use filawatch_core::mocks::{SpyNotifier, SpyPrinter};
use filawatch_core::policy::{TriggerDecision, TriggerKind};

fn runout_decision() -> TriggerDecision {
    TriggerDecision {
        extruder: 0,
        kind: TriggerKind::Runout,
    }
}

fn dispatcher_with_script(
    printer: SpyPrinter,
    runout_script: &str,
    notifier: Option<SpyNotifier>,
    notifications_enabled: bool,
) -> ActionDispatcher<SpyPrinter> {
    let scripts = ActionScripts {
        runout: runout_script.to_string(),
        motion_timeout: String::new(),
    };
    ActionDispatcher::new(
        printer,
        scripts,
        notifier.map(|n| Box::new(n) as Box<dyn filawatch_traits::Notifier + Send>),
        notifications_enabled,
    )
}

#[test]
fn empty_script_pauses_exactly_once() {
    let printer = SpyPrinter::new(true);
    let mut dispatcher = dispatcher_with_script(printer.clone(), "", None, false);
    dispatcher.dispatch(&runout_decision());
    assert_eq!(printer.pauses(), 1);
    assert!(printer.commands().is_empty());
}

#[test]
fn whitespace_only_script_falls_back_to_pause() {
    let printer = SpyPrinter::new(true);
    let mut dispatcher = dispatcher_with_script(printer.clone(), "  \n\t\n  ", None, false);
    dispatcher.dispatch(&runout_decision());
    assert_eq!(printer.pauses(), 1);
    assert!(printer.commands().is_empty());
}

#[test]
fn script_lines_are_parsed_by_prefix() {
    let printer = SpyPrinter::new(true);
    let script = "@pause\n; operator note, log only\nM117 Check filament\n\nM600";
    let mut dispatcher = dispatcher_with_script(printer.clone(), script, None, false);
    dispatcher.dispatch(&runout_decision());

    assert_eq!(printer.pauses(), 1);
    assert_eq!(printer.commands(), vec!["M117 Check filament", "M600"]);
}

#[test]
fn unknown_action_commands_are_ignored() {
    let printer = SpyPrinter::new(true);
    let mut dispatcher = dispatcher_with_script(printer.clone(), "@resume\nM117 hi", None, false);
    dispatcher.dispatch(&runout_decision());
    assert_eq!(printer.pauses(), 0);
    assert_eq!(printer.commands(), vec!["M117 hi"]);
}

#[test]
fn a_failing_line_does_not_stop_later_lines() {
    let printer = SpyPrinter::new(true);
    if let Ok(mut log) = printer.log().lock() {
        log.fail_commands = true;
    }
    let mut dispatcher =
        dispatcher_with_script(printer.clone(), "M600\n@pause\nM117 unreachable?", None, false);
    dispatcher.dispatch(&runout_decision());

    // Both command lines failed, but the pause between them still ran.
    assert_eq!(printer.pauses(), 1);
    assert!(printer.commands().is_empty());
}

#[test]
fn notification_is_emitted_when_enabled() {
    let printer = SpyPrinter::new(true);
    let notifier = SpyNotifier::new();
    let mut dispatcher =
        dispatcher_with_script(printer, "", Some(notifier.clone()), true);
    dispatcher.dispatch(&runout_decision());

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "runout");
    assert_eq!(events[0].1, 0);
    assert!(events[0].2.contains("E0"));
}

#[test]
fn notification_is_suppressed_when_disabled() {
    let printer = SpyPrinter::new(true);
    let notifier = SpyNotifier::new();
    let mut dispatcher =
        dispatcher_with_script(printer, "", Some(notifier.clone()), false);
    dispatcher.dispatch(&runout_decision());
    assert!(notifier.events().is_empty());
}

#[test]
fn motion_timeout_uses_its_own_script() {
    let printer = SpyPrinter::new(true);
    let scripts = ActionScripts {
        runout: "M600".to_string(),
        motion_timeout: "M117 jam?".to_string(),
    };
    let mut dispatcher = ActionDispatcher::new(printer.clone(), scripts, None, false);
    dispatcher.dispatch(&TriggerDecision {
        extruder: 1,
        kind: TriggerKind::MotionTimeout,
    });
    assert_eq!(printer.commands(), vec!["M117 jam?"]);
}

#[test]
fn channel_notifier_delivers_to_the_receiver() {
    use filawatch_core::actions::ChannelNotifier;
    use filawatch_traits::Notifier;

    let (mut notifier, rx) = ChannelNotifier::new(4);
    notifier
        .notify("runout", 1, "Filament runout detected on E1")
        .expect("send into empty channel");
    let note = rx.try_recv().expect("one queued notification");
    assert_eq!(note.kind, "runout");
    assert_eq!(note.extruder, 1);

    // A full channel reports the failure instead of blocking the poll loop.
    for _ in 0..4 {
        let _ = notifier.notify("motion_timeout", 0, "stall");
    }
    assert!(notifier.notify("motion_timeout", 0, "stall").is_err());
}
