// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub fn sh_escape(p: &str) -> String {
    let mut out = String::from("'");
    out.push_str(&p.replace('\'', r"'\''"));
    out.push('\'');
    out
}

/// Leaves plain words untouched and single-quotes everything else.
pub fn sh_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:@%+=,-".contains(c));
    if plain {
        word.to_string()
    } else {
        sh_escape(word)
    }
}

/// `cd <remote_dir> && turnin <assignment> <files...>`
pub fn turnin_command(remote_dir: &str, assignment: &str, files: &[String]) -> String {
    let mut command = format!("cd {} && turnin {}", sh_quote(remote_dir), sh_quote(assignment));
    for file in files {
        command.push(' ');
        command.push_str(&sh_quote(file));
    }
    command
}

pub fn remove_dir_command(remote_dir: &str) -> String {
    format!("rm -r {}", sh_quote(remote_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_not_quoted() {
        assert_eq!(sh_quote("/home/alice/turnin/"), "/home/alice/turnin/");
        assert_eq!(sh_quote("hw1@cs120"), "hw1@cs120");
    }

    #[test]
    fn unsafe_words_are_single_quoted() {
        assert_eq!(sh_quote("my file.py"), "'my file.py'");
        assert_eq!(sh_quote("it's.py"), r"'it'\''s.py'");
        assert_eq!(sh_quote("a;rm -rf ~"), "'a;rm -rf ~'");
        assert_eq!(sh_quote(""), "''");
    }

    #[test]
    fn builds_turnin_command() {
        let files = vec!["main.py".to_string(), "notes file.txt".to_string()];
        assert_eq!(
            turnin_command("/home/alice/turnin/", "hw1", &files),
            "cd /home/alice/turnin/ && turnin hw1 main.py 'notes file.txt'"
        );
    }
}
