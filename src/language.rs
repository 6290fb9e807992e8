//! Static language table: detection and comment/indent metadata
//!
//! Detection scans extensions first, then exact filenames; lookup by user
//! command prefers prefix matches on the name, then an extension match.
//! First match wins in every case.

use std::path::Path;

/// How a language indents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Tabs,
    Spaces,
}

/// One language record
#[derive(Debug, Clone, Copy)]
pub struct Language {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub filenames: &'static [&'static str],
    pub line_comment: Option<&'static str>,
    pub block_comment: Option<(&'static str, &'static str)>,
    pub indent_style: IndentStyle,
    pub indent_width: usize,
}

/// Fallback for unknown files
pub const PLAIN: Language = Language {
    name: "text",
    extensions: &["txt"],
    filenames: &[],
    line_comment: None,
    block_comment: None,
    indent_style: IndentStyle::Spaces,
    indent_width: 4,
};

pub static LANGUAGES: &[Language] = &[
    Language {
        name: "rust",
        extensions: &["rs"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "c",
        extensions: &["c", "h"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "cpp",
        extensions: &["cc", "cpp", "cxx", "hpp", "hh"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "zig",
        extensions: &["zig"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "go",
        extensions: &["go"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Tabs,
        indent_width: 8,
    },
    Language {
        name: "python",
        extensions: &["py"],
        filenames: &[],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "shell",
        extensions: &["sh", "bash", "zsh"],
        filenames: &[".bashrc", ".zshrc", ".profile"],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "ruby",
        extensions: &["rb"],
        filenames: &["Rakefile", "Gemfile"],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "perl",
        extensions: &["pl", "pm"],
        filenames: &[],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "lua",
        extensions: &["lua"],
        filenames: &[],
        line_comment: Some("--"),
        block_comment: Some(("--[[", "]]")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "haskell",
        extensions: &["hs"],
        filenames: &[],
        line_comment: Some("--"),
        block_comment: Some(("{-", "-}")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "javascript",
        extensions: &["js", "mjs", "jsx"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "typescript",
        extensions: &["ts", "tsx"],
        filenames: &[],
        line_comment: Some("//"),
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "html",
        extensions: &["html", "htm"],
        filenames: &[],
        line_comment: None,
        block_comment: Some(("<!--", "-->")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "css",
        extensions: &["css"],
        filenames: &[],
        line_comment: None,
        block_comment: Some(("/*", "*/")),
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "make",
        extensions: &["mk"],
        filenames: &["Makefile", "makefile", "GNUmakefile"],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Tabs,
        indent_width: 8,
    },
    Language {
        name: "toml",
        extensions: &["toml"],
        filenames: &["Cargo.lock"],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    Language {
        name: "yaml",
        extensions: &["yaml", "yml"],
        filenames: &[],
        line_comment: Some("#"),
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "json",
        extensions: &["json"],
        filenames: &[],
        line_comment: None,
        block_comment: None,
        indent_style: IndentStyle::Spaces,
        indent_width: 2,
    },
    Language {
        name: "markdown",
        extensions: &["md", "markdown"],
        filenames: &[],
        line_comment: None,
        block_comment: Some(("<!--", "-->")),
        indent_style: IndentStyle::Spaces,
        indent_width: 4,
    },
    PLAIN,
];

/// Detect the language of a path: extensions first, then exact filenames
pub fn detect(path: &Path) -> &'static Language {
    let ext = path.extension().and_then(|e| e.to_str());
    if let Some(ext) = ext {
        for lang in LANGUAGES {
            if lang.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                return lang;
            }
        }
    }
    let name = path.file_name().and_then(|n| n.to_str());
    if let Some(name) = name {
        for lang in LANGUAGES {
            if lang.filenames.contains(&name) {
                return lang;
            }
        }
    }
    &PLAIN
}

/// Lookup by user command: name prefix first, then extension, first hit wins
pub fn lookup(query: &str) -> Option<&'static Language> {
    LANGUAGES
        .iter()
        .find(|l| l.name.starts_with(query))
        .or_else(|| {
            LANGUAGES
                .iter()
                .find(|l| l.extensions.contains(&query))
        })
}
