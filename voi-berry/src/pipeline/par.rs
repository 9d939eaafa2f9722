//! patient 级并行批处理. 各 patient 之间不存在共享可变状态,
//! 可以无协调地并行.

use std::fmt::Display;
use std::path::Path;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use super::{BatchSummary, ExtractConfig, OutputTree, PatientJob};
use crate::CtVolume;

/// [`super::run_patients`] 的并行版本. 借助 `rayon`,
/// 以 patient 为粒度并行加载与处理.
pub fn run_patients_par<F, E>(
    jobs: &[PatientJob],
    load_volume: F,
    tree: &OutputTree,
    config: &ExtractConfig,
) -> BatchSummary
where
    F: Fn(&Path) -> Result<CtVolume, E> + Sync,
    E: Display,
{
    let results: Vec<_> = jobs
        .par_iter()
        .map(|job| super::run_job(job, &load_volume, tree, config))
        .collect();

    let mut batch = BatchSummary::default();
    for result in results {
        batch.push(result);
    }
    batch
}
