use std::rc::Rc;

use sorrel::{Config, VM};

mod cli;
mod repl;

fn main() {
    let args = cli::Cli::new();

    if let Some(path) = args.path {
        let mut vm = VM::with_config(Rc::new(Config::new()));

        if let Err(err) = vm.exec_file(&path) {
            err.emit();
            std::process::exit(1);
        }
    } else {
        let mut config = Config::new();
        config.repl = true;

        let vm = VM::with_config(Rc::new(config));

        repl::Repl::new(vm).run();
    }
}
