use crate::preprocess::{pre_process, PreProcessorData};
use crate::{read_source_str, Options};
use std::io::Write;
use std::path::Path;
use util::{Level, MessageList};

fn pre_process_str(source: &str) -> (PreProcessorData, MessageList) {
    let mut data = PreProcessorData::new();
    let mut messages = MessageList::new();
    read_source_str(Path::new("test.asm"), source, &mut data);
    let _ = pre_process(&mut data, &Options::default(), &mut messages);
    (data, messages)
}

fn lines(data: &PreProcessorData) -> Vec<&str> {
    data.lines.iter().map(|l| l.text.as_str()).collect()
}

#[test]
fn clean_input_is_a_fixed_point() {
    let source = "main:\n    load $r1, 42   ; trailing comment\n\n    exit\n";
    let (data, messages) = pre_process_str(source);
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["main:", "load $r1, 42", "exit"]);

    // running the pre-processor over its own output changes nothing
    let again = data.lines.iter().map(|l| l.text.clone()).collect::<Vec<_>>().join("\n");
    let (data2, _) = pre_process_str(&again);
    assert_eq!(lines(&data2), lines(&data));
}

#[test]
fn comments_inside_strings_survive() {
    let (data, messages) = pre_process_str(".byte \"a;b\" ; real comment");
    assert!(!messages.has_error());
    assert_eq!(lines(&data), [".byte \"a;b\""]);
}

#[test]
fn define_substitutes_textually() {
    let (data, messages) = pre_process_str("%define FOO 7\nload $r1, FOO");
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["load $r1, 7"]);
}

#[test]
fn define_redefinition_warns_and_replaces() {
    let (data, messages) = pre_process_str("%define X 1\n%define X 2\nload $r1, X");
    assert!(messages.has_message_of(Level::Warning));
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["load $r1, 2"]);
}

#[test]
fn macro_expansion_substitutes_parameters() {
    let source = "%macro square x\n  mul $r1, x, x\n%end\nsquare 3";
    let (data, messages) = pre_process_str(source);
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["mul $r1, 3, 3"]);
}

#[test]
fn macro_lines_keep_the_call_site_location() {
    let source = "%macro two\n  nop\n  nop\n%end\ntwo";
    let (data, messages) = pre_process_str(source);
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["nop", "nop"]);
    // both expanded lines point at the call, line 4
    assert!(data.lines.iter().all(|l| l.loc.line() == 4));
}

#[test]
fn macro_argument_count_mismatch_is_an_error() {
    let source = "%macro pair a b\n  load $r1, a\n%end\npair 1";
    let (_, messages) = pre_process_str(source);
    assert!(messages.has_error());
    let text = messages.iter().map(|m| m.text().to_string()).collect::<Vec<_>>().join("\n");
    assert!(text.contains("expects 2 argument(s), received 1"), "{}", text);
    // a note points back at the definition
    assert!(messages.has_message_of(Level::Note));
}

#[test]
fn duplicate_macro_parameter_is_an_error() {
    let (_, messages) = pre_process_str("%macro m x x\n%end");
    assert!(messages.has_error());
}

#[test]
fn only_end_is_legal_inside_a_macro_body() {
    let (_, messages) = pre_process_str("%macro m\n%define Y 1\n%end");
    assert!(messages.has_error());
}

#[test]
fn nested_macro_calls_expand() {
    let source = "%macro inner v\n  load $r1, v\n%end\n%macro outer v\n  inner v\n%end\nouter 9";
    let (data, messages) = pre_process_str(source);
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["load $r1, 9"]);
}

#[test]
fn rm_is_a_comment() {
    let (data, messages) = pre_process_str("%rm this text is discarded\nnop");
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["nop"]);
}

#[test]
fn stop_truncates_the_remaining_lines() {
    let (data, messages) = pre_process_str("nop\n%stop\nload $r1, 1\nload $r2, 2");
    assert!(!messages.has_error());
    assert_eq!(lines(&data), ["nop"]);
}

#[test]
fn unknown_directive_is_an_error() {
    let (_, messages) = pre_process_str("%frobnicate");
    assert!(messages.has_error());
}

#[test]
fn section_lines_are_ignored() {
    let (data, messages) = pre_process_str(".section text\nnop");
    assert!(!messages.has_error());
    assert_eq!(lines(&data), [".section text", "nop"]);
}

#[test]
fn include_splices_lines_at_the_directive() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("defs.asm");
    let mut file = std::fs::File::create(&lib).unwrap();
    writeln!(file, "%define ANSWER 42").unwrap();
    writeln!(file, "helper:").unwrap();
    writeln!(file, "    ret").unwrap();
    drop(file);

    let main = dir.path().join("main.asm");
    std::fs::write(&main, "%include defs\nload $r1, ANSWER\n").unwrap();

    let mut data = PreProcessorData::new();
    let mut messages = MessageList::new();
    crate::read_source_file(&main, &mut data, &mut messages).unwrap();
    pre_process(&mut data, &Options::default(), &mut messages).unwrap();

    assert!(!messages.has_error());
    let texts: Vec<&str> = data.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, ["helper:", "ret", "load $r1, 42"]);
}

#[test]
fn circular_include_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.asm"), "%include b\nnop\n").unwrap();
    std::fs::write(dir.path().join("b.asm"), "%include a\nnop\n").unwrap();

    let mut data = PreProcessorData::new();
    let mut messages = MessageList::new();
    crate::read_source_file(&dir.path().join("a.asm"), &mut data, &mut messages).unwrap();
    assert!(pre_process(&mut data, &Options::default(), &mut messages).is_err());

    let errors: Vec<&str> = messages
        .iter()
        .filter(|m| m.level() == Level::Error)
        .map(|m| m.text())
        .collect();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("circular %include"));
    assert!(messages.has_message_of(Level::Note));
}
