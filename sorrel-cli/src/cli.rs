//! CLI for the Sorrel programming language.

use clap::{App, Arg};

#[derive(Debug)]
pub struct Cli {
    /// Path to the file to run. If one isn't given, REPL mode will be run instead.
    pub path: Option<String>,
}

impl Cli {
    pub fn new() -> Self {
        let matches = app().get_matches();

        let path = matches.value_of("FILE.srl").map(|path| path.to_string());

        Cli { path }
    }
}

fn app() -> App<'static, 'static> {
    App::new("sorrel")
        .about("The Sorrel scripting language")
        .version(concat!("v", env!("CARGO_PKG_VERSION")))
        .arg(Arg::with_name("FILE.srl").help("Path to file"))
        .arg(
            // Accepted but unused for now; scripts have no argv surface.
            Arg::with_name("arguments")
                .help("Arguments passed to program")
                .multiple(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_and_trailing_arguments_parse() {
        let matches = app().get_matches_from(vec!["sorrel", "script.srl", "one", "two"]);
        assert_eq!(matches.value_of("FILE.srl"), Some("script.srl"));
        assert_eq!(
            matches.values_of("arguments").unwrap().collect::<Vec<_>>(),
            vec!["one", "two"]
        );
    }

    #[test]
    fn no_file_means_repl() {
        let matches = app().get_matches_from(vec!["sorrel"]);
        assert_eq!(matches.value_of("FILE.srl"), None);
    }
}
