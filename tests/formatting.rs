mod common;

use common::ScriptedBackend;
use gguf_llama::text::{remove_list_formatting, remove_non_letters};
use gguf_llama::{fix_formatting, FormatOptions, Session, SessionConfig};

#[test]
fn test_header_before_blank_line_is_dropped() {
    let fixed = fix_formatting("Title\n\nBody line one\nBody line two", FormatOptions::default());
    assert_eq!(fixed, "Body line one Body line two");
}

#[test]
fn test_session_fixes_generated_answer() {
    let backend = ScriptedBackend::replying("Answer:\n\n1. Paris is the capital\n2. It is in France");
    let mut session = Session::with_backend(backend, SessionConfig::new("m.gguf", 256)).unwrap();

    let raw = session.infer_text("Capital of France?").unwrap();
    let options = FormatOptions {
        strip_list_markers: true,
        ..Default::default()
    };
    assert_eq!(session.fix_formatting(&raw, options), "Paris is the capital It is in France");
}

#[test]
fn test_all_cleanups_together() {
    let options = FormatOptions {
        strip_non_letters: true,
        strip_list_markers: true,
    };
    let fixed = fix_formatting("Shopping list\n\n- 2 eggs\n- milk (1L)", options);
    assert_eq!(fixed, "eggs milk L");
}

#[test]
fn test_cleanup_utilities() {
    assert_eq!(remove_non_letters("a1 b2, c3!"), "a b c");
    assert_eq!(remove_list_formatting("1) first\n2) second"), "first second");
    assert_eq!(remove_list_formatting("• one • two"), "one two");
}
