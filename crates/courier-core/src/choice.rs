// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Choice identifiers carried in quick-reply and postback payloads.
//!
//! A choice id has the shape `intent?key=value&key2=value2`, with keys and
//! values form-urlencoded. Keys starting with `_` are reserved.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// Target step of the choice.
pub const STEP_PARAMETER: &str = "_step";
/// Intent that was active when the choice was offered.
pub const PREVIOUS_INTENT_PARAMETER: &str = "_previous_intent";
/// Application that emitted the choice.
pub const SOURCE_APP_PARAMETER: &str = "_source";
/// Title shown to the user.
pub const TITLE_PARAMETER: &str = "_title";
/// Free text to be analysed as a sentence instead of a choice.
pub const NLP_PARAMETER: &str = "_nlp";

/// Decodes a choice id into its intent name and parameters.
///
/// An id without `?` is a bare intent with no parameters.
pub fn decode_choice_id(id: &str) -> (String, BTreeMap<String, String>) {
    match id.split_once('?') {
        None => (id.to_string(), BTreeMap::new()),
        Some((intent, query)) => {
            let parameters = form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            (intent.to_string(), parameters)
        }
    }
}

/// Encodes an intent and its parameters into a choice id.
pub fn encode_choice_id(intent: &str, parameters: &BTreeMap<String, String>) -> String {
    if parameters.is_empty() {
        return intent.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(parameters.iter())
        .finish();
    format!("{intent}?{query}")
}

/// Encodes a choice id whose text is handed to the NLP engine as a sentence.
pub fn encode_nlp_choice_id(text: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(NLP_PARAMETER, text)
        .finish();
    format!("?{query}")
}
