// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shell-style quoting for command lines shown to the operator.

/// Quote `word` for a POSIX shell unless it only contains safe characters.
pub fn shell_escape(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_+/=.,:%-".contains(c));
    if safe {
        word.to_owned()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Quote every word and join with spaces.
pub fn shell_escape_list<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_escape(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
