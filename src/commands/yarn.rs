use anyhow::Result;
use clusterkit::Cluster;
use clusterkit::api::MutationRequest;

use super::{cluster, pair_properties};
use crate::Context;
use crate::cli::{QueueArgs, YarnCommand};
use crate::ui;

pub fn run(ctx: &Context, cmd: YarnCommand) -> Result<()> {
    let cluster = cluster(ctx)?;
    match cmd {
        YarnCommand::Queues => {
            let root = cluster.get_queues()?;
            ui::header(&format!("Capacity Scheduler Queues ({})", root.count()));
            print!("{}", root.render_tree());
            Ok(())
        }
        YarnCommand::Info => {
            let metrics = cluster.get_metrics()?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        }
        YarnCommand::UpdateQueue(args) => {
            let request = queue_request(&args, MutationRequest::update_queue)?;
            mutate(&cluster, &request, args.dry_run)
        }
        YarnCommand::AddQueue(args) => {
            let request = queue_request(&args, MutationRequest::add_queue)?;
            mutate(&cluster, &request, args.dry_run)
        }
        YarnCommand::RemoveQueue { queue, dry_run } => {
            let mut request = MutationRequest::new();
            request.remove_queue(&queue);
            mutate(&cluster, &request, dry_run)
        }
        YarnCommand::GlobalUpdate { key, value, dry_run } => {
            let mut request = MutationRequest::new();
            request.global_update(&key, &value);
            mutate(&cluster, &request, dry_run)
        }
    }
}

fn queue_request(
    args: &QueueArgs,
    add: for<'a> fn(&'a mut MutationRequest, &str, &[(&str, &str)]) -> &'a mut MutationRequest,
) -> Result<MutationRequest> {
    let params = pair_properties(&args.properties, &args.values)?;
    let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut request = MutationRequest::new();
    add(&mut request, &args.queue, &params);
    Ok(request)
}

fn mutate(cluster: &Cluster, request: &MutationRequest, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", request.to_xml(true)?);
        return Ok(());
    }
    cluster.mutate_scheduler(request)?;
    ui::success("Scheduler configuration updated");
    Ok(())
}
