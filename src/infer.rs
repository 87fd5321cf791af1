// -- imports
use indicatif::{ProgressFinish, ProgressIterator};
use std::time::Instant;

use crate::config::ExecutorConfig;
use crate::dataset::{CandidateIndex, decode_image};
use crate::error::Result;
use crate::model::Detector;
use crate::monitor::{Monitor, Stage, monitor_gap, stage_percent};
use crate::progress_bar::progress_bar_style;
use crate::writer::{InferResult, ResultWriter};

/// Run the inference stage: sequential pass over the candidate partition,
/// one final result write, throttled progress reports throughout.
///
/// Reported percentages are non-decreasing across the run. The writer is
/// invoked exactly once, also for an empty candidate set.
pub fn run_infer_task(
    config: &ExecutorConfig,
    detector: &Detector,
    index: &CandidateIndex,
    monitor: &mut dyn Monitor,
    writer: &mut dyn ResultWriter,
) -> Result<()> {
    let start_time = Instant::now();
    let slot = config.infer_task_slot();

    tracing::info!("Running sequential inference...");
    tracing::info!("Candidate images to process: {}", index.len());
    tracing::info!("-----------------------------------------");

    // Model initialization is behind us; close out the preprocess stage
    monitor.write_percent(stage_percent(Stage::Preprocess, 1.0, slot))?;

    let total = index.len();
    let gap = monitor_gap(total);
    let mut result = InferResult::with_capacity(total);

    for (idx, path) in index
        .items()
        .iter()
        .enumerate()
        .progress_with_style(progress_bar_style())
        .with_message("Running inference")
        .with_finish(ProgressFinish::WithMessage("Finished".into()))
    {
        // A corrupt candidate aborts the whole run
        let image = decode_image(path)?;
        let annotations = detector.infer(&image)?;
        result.insert(path.clone(), annotations);

        if idx % gap == 0 {
            // total > 0 whenever the loop body runs
            let p = idx as f32 / total as f32;
            monitor.write_percent(stage_percent(Stage::Task, p, slot))?;
        }
    }

    writer.write(&result)?;
    monitor.write_percent(stage_percent(Stage::Postprocess, 1.0, slot))?;

    let duration = start_time.elapsed();
    tracing::info!(
        "Processed {} candidate images in {:.3?}",
        result.len(),
        duration
    );
    Ok(())
}

// -- tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Detection;
    use crate::model::{Detector, ModelConfig};
    use crate::monitor::MemoryMonitor;
    use crate::predictor::ScriptedPredictor;
    use crate::writer::MemoryWriter;
    use image::DynamicImage;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn executor_config() -> ExecutorConfig {
        let mut config = ExecutorConfig::default();
        config.param.class_names = vec!["cat".into(), "dog".into(), "bird".into()];
        config
    }

    fn scripted_detector(config: &ExecutorConfig, detections: Vec<Detection>) -> Detector {
        Detector::with_predictor(
            config,
            ModelConfig::default().freeze(),
            Box::new(ScriptedPredictor::new(detections)),
        )
    }

    fn write_images(dir: &Path, count: usize) -> Vec<PathBuf> {
        let first = dir.join("img_0000.png");
        DynamicImage::new_rgb8(8, 8).save(&first).unwrap();
        let mut paths = vec![first.clone()];
        for i in 1..count {
            let path = dir.join(format!("img_{:04}.png", i));
            fs::copy(&first, &path).unwrap();
            paths.push(path);
        }
        paths
    }

    fn write_index(dir: &Path, paths: &[PathBuf]) -> CandidateIndex {
        let index_file = dir.join("candidate-index.tsv");
        let content: String = paths
            .iter()
            .map(|p| format!("{}\n", p.display()))
            .collect();
        fs::write(&index_file, content).unwrap();
        CandidateIndex::load(&index_file).unwrap()
    }

    fn assert_non_decreasing(percents: &[f32]) {
        for pair in percents.windows(2) {
            assert!(pair[1] >= pair[0], "percent went backwards: {:?}", pair);
        }
    }

    #[test]
    fn test_end_to_end_single_image() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(
            &config,
            vec![Detection {
                xmin: 0.0,
                ymin: 0.0,
                xmax: 10.0,
                ymax: 10.0,
                score: 0.9,
                class_id: 1,
            }],
        );
        let paths = write_images(temp_dir.path(), 1);
        let index = write_index(temp_dir.path(), &paths);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        assert_eq!(writer.written.len(), 1);
        let result = &writer.written[0];
        assert_eq!(result.len(), 1);
        let anns = result.get(&paths[0]).unwrap();
        assert_eq!(anns.len(), 1);
        assert_eq!(anns[0].class_name, "dog");
        assert_eq!(anns[0].score, 0.9);
        assert_eq!(anns[0].bbox.x, 0);
        assert_eq!(anns[0].bbox.y, 0);
        assert_eq!(anns[0].bbox.w, 10);
        assert_eq!(anns[0].bbox.h, 10);

        assert_non_decreasing(&monitor.percents);
        assert_eq!(*monitor.percents.last().unwrap(), 1.0);
    }

    #[test]
    fn test_empty_candidate_set_still_writes_empty_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(&config, vec![]);
        let index = write_index(temp_dir.path(), &[]);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        assert_eq!(writer.written.len(), 1);
        assert!(writer.written[0].is_empty());
        // Only the preprocess-complete and run-complete reports
        assert_eq!(monitor.percents, vec![0.1, 1.0]);
    }

    #[test]
    fn test_progress_cadence_is_throttled_and_monotonic() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(&config, vec![]);
        let paths = write_images(temp_dir.path(), 200);
        let index = write_index(temp_dir.path(), &paths);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        // gap = 2: a report every other image, plus the preprocess and
        // completion reports
        assert_eq!(monitor.percents.len(), 100 + 2);
        assert_non_decreasing(&monitor.percents);
        assert_eq!(monitor.percents[0], 0.1);
        assert_eq!(*monitor.percents.last().unwrap(), 1.0);
    }

    #[test]
    fn test_progress_cadence_bound_holds_for_uneven_counts() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(&config, vec![]);
        let paths = write_images(temp_dir.path(), 250);
        let index = write_index(temp_dir.path(), &paths);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        // gap = ceil(250 / 100) = 3: 84 in-loop reports, plus the
        // preprocess and completion reports, within the 100 + 2 bound
        assert_eq!(monitor.percents.len(), 84 + 2);
        assert!(monitor.percents.len() <= 102);
        assert_non_decreasing(&monitor.percents);
        assert_eq!(*monitor.percents.last().unwrap(), 1.0);
    }

    #[test]
    fn test_result_keys_follow_index_order() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(&config, vec![]);
        let paths = write_images(temp_dir.path(), 3);
        let index = write_index(temp_dir.path(), &paths);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        let keys: Vec<_> = writer.written[0].iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(keys, paths);
    }

    #[test]
    fn test_unreadable_image_aborts_run_without_writing() {
        let temp_dir = TempDir::new().unwrap();
        let config = executor_config();
        let detector = scripted_detector(&config, vec![]);
        let bogus = temp_dir.path().join("broken.jpg");
        fs::write(&bogus, b"not an image").unwrap();
        let index = write_index(temp_dir.path(), &[bogus]);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        let outcome = run_infer_task(&config, &detector, &index, &mut monitor, &mut writer);

        assert!(outcome.is_err());
        assert!(writer.written.is_empty());
    }

    #[test]
    fn test_second_of_two_tasks_scales_into_upper_half() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = executor_config();
        config.task.run_mining = true;
        config.task.run_infer = true;
        let detector = scripted_detector(&config, vec![]);
        let paths = write_images(temp_dir.path(), 2);
        let index = write_index(temp_dir.path(), &paths);

        let mut monitor = MemoryMonitor::default();
        let mut writer = MemoryWriter::default();
        run_infer_task(&config, &detector, &index, &mut monitor, &mut writer).unwrap();

        assert!(monitor.percents.iter().all(|p| *p >= 0.5));
        assert_eq!(monitor.percents[0], 0.55);
        assert_eq!(*monitor.percents.last().unwrap(), 1.0);
    }
}
