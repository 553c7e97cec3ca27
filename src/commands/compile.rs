use anyhow::Result;
use clusterkit::{HadoopDir, MavenCompiler};

use super::{load_config, open_cluster};
use crate::Context;
use crate::cli::CompileArgs;
use crate::ui;

pub fn run(ctx: &Context, args: CompileArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let mut hadoop = HadoopDir::new(config.hadoop_dir()?);

    if !args.modules.is_empty() {
        hadoop.add_modules(&args.modules, false);
    } else if args.changed {
        hadoop.add_modules(&config.default_modules, false);
        hadoop.extract_changed_modules()?;
    }
    let modules: Vec<String> = hadoop.modules().into_iter().map(String::from).collect();
    if modules.is_empty() {
        ui::info("No modules picked, compiling the whole project");
    } else {
        ui::info(&format!("Found modules: {}", modules.join(", ")));
    }

    MavenCompiler::new(&config.compile_cmd).compile(&hadoop)?;
    // Jars only exist once the build is done
    hadoop.add_modules(&modules, true);
    ui::success("Compilation finished");

    if !args.no_copy && !modules.is_empty() {
        let copied = hadoop.copy_modules_to_dist(&config.jar_dir()?, &modules)?;
        ui::success(&format!("Copied {} jars to {}", copied.len(), config.hadoop_jar_path));
    }

    if args.deploy {
        let cluster = open_cluster(ctx, &config)?;
        cluster.replace_module_jars("", &hadoop)?;
        ui::success(&format!("Deployed {} modules to the cluster", hadoop.jar_paths().len()));
    }
    Ok(())
}
