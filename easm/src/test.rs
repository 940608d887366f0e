use crate::data::Data;
use crate::{assemble_str, Options};
use util::MessageList;

mod binary;
mod parser;
mod preprocess;

/// Assemble `source` with default options, asserting no diagnostics at all.
pub fn assemble_clean(source: &str) -> Data {
    let mut messages = MessageList::new();
    let data = assemble_str("test.asm", source, &Options::default(), &mut messages)
        .expect("assembly failed");
    assert!(
        messages.is_empty(),
        "unexpected diagnostics: {:?}",
        messages.iter().map(|m| m.text().to_string()).collect::<Vec<_>>()
    );
    data
}

/// Assemble `source`, returning whatever diagnostics were produced.
pub fn assemble_collect(source: &str) -> (Result<Data, util::Failed>, MessageList) {
    let mut messages = MessageList::new();
    let result = assemble_str("test.asm", source, &Options::default(), &mut messages);
    (result, messages)
}
