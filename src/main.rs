/// Inference executor entrypoint: no CLI arguments, configuration comes
/// from the orchestrator-provided config file (see `ExecutorConfig::from_env`).
/// Exits 0 on success; any error propagates to a nonzero exit.
use infer_executor::{
    CandidateIndex, Detector, ExecutorConfig, FileMonitor, JsonResultWriter, init_logger,
    run_infer_task,
};

fn main() -> anyhow::Result<()> {
    init_logger();

    let config = ExecutorConfig::from_env()?;
    tracing::info!(
        "Inference task {:?}: {} classes, conf_threshold {}, backend {:?}",
        config.infer_task_slot(),
        config.param.class_names.len(),
        config.param.conf_threshold,
        config.param.backend
    );

    let detector = Detector::load(&config)?;
    let index = CandidateIndex::load(&config.input.candidate_index)?;

    let mut monitor = FileMonitor::new(config.output.monitor_file.clone());
    let mut writer = JsonResultWriter::new(config.output.infer_result_file.clone());

    run_infer_task(&config, &detector, &index, &mut monitor, &mut writer)?;
    Ok(())
}
