//! Maven builds of selected Hadoop modules.

use runkit::{AsyncOptions, Command};

use crate::error::{Error, Result};
use crate::module::HadoopDir;

const MODULE_PREFIX: &str = "org.apache.hadoop";

/// Compiles Hadoop modules with a configured Maven command line.
#[derive(Debug, Clone)]
pub struct MavenCompiler {
    compile_cmd: String,
}

impl MavenCompiler {
    /// A compiler running `compile_cmd`, e.g. `mvn clean install -DskipTests`.
    pub fn new(compile_cmd: impl Into<String>) -> Self {
        Self {
            compile_cmd: compile_cmd.into(),
        }
    }

    /// The full command compiling the picked modules of `hadoop`.
    pub fn command(&self, hadoop: &HadoopDir) -> Command {
        let mut text = self.compile_cmd.clone();
        for module in hadoop.modules() {
            text.push_str(&format!(" -pl {MODULE_PREFIX}:{module}"));
        }
        Command::new(text).with_work_dir(hadoop.root())
    }

    /// Compile, streaming the build output to the log.
    ///
    /// On failure the `ERROR` lines of the build are put into the error message.
    pub fn compile(&self, hadoop: &HadoopDir) -> Result<()> {
        let cmd = self.command(hadoop);
        log::info!("Compiling: {}", cmd.text());
        let result = cmd
            .run_async(AsyncOptions::blocking(None))
            .and_then(|mut handle| handle.wait(None));
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let errors = error_lines(err.stdout().iter().chain(err.stderr()));
                if errors.is_empty() {
                    Err(err.into())
                } else {
                    Err(Error::Other(format!(
                        "compilation failed: {}\n{}",
                        cmd.text(),
                        errors.join("\n")
                    )))
                }
            }
        }
    }
}

fn error_lines<'a>(lines: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    lines
        .filter(|line| line.contains("ERROR"))
        .map(String::as_str)
        .collect()
}
