//! Append-only telemetry monitors.
//!
//! A [`Monitor`] is the writer capability: the solver (or a cost wrapper)
//! records `(x, cost)` samples into it. A [`MonitorReader`] is the read-only
//! capability handed to collapse detectors; it takes snapshot copies under
//! the store lock, so concurrent writes never corrupt a read.
//!
//! The verbose variant echoes every k-th record to an output sink; the
//! silent variant (the default) just accumulates.

use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use ndarray::{Array1, Array2};

/// One recorded sample.
#[derive(Debug, Clone)]
pub struct Record {
    /// Index of this entry in the monitor, starting at 0.
    pub step: usize,
    pub x: Array1<f64>,
    pub cost: f64,
    /// Per-measure weights of a product-measure problem, if recorded.
    pub weights: Option<Vec<Array1<f64>>>,
    /// Per-measure positions of a product-measure problem, if recorded.
    pub positions: Option<Vec<Array1<f64>>>,
}

#[derive(Default)]
struct Store {
    records: Vec<Record>,
}

struct Echo {
    out: Box<dyn Write + Send>,
    stride: usize,
}

/// Writer handle over an append-only record store.
#[derive(Clone, Default)]
pub struct Monitor {
    store: Arc<Mutex<Store>>,
    echo: Option<Arc<Mutex<Echo>>>,
}

impl Monitor {
    /// A silent monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// A monitor that writes every `stride`-th record to `sink`.
    pub fn verbose(sink: Box<dyn Write + Send>, stride: usize) -> Self {
        Self {
            store: Arc::default(),
            echo: Some(Arc::new(Mutex::new(Echo {
                out: sink,
                stride: stride.max(1),
            }))),
        }
    }

    /// Record a cost-function evaluation.
    pub fn record(&self, x: &Array1<f64>, cost: f64) {
        self.push(x.clone(), cost, None, None);
    }

    /// Record the state at the top of a solver iteration.
    pub fn record_step(&self, x: &Array1<f64>, cost: f64) {
        self.push(x.clone(), cost, None, None);
    }

    /// Record a product-measure sample with per-measure weights and positions.
    pub fn record_measures(
        &self,
        x: &Array1<f64>,
        cost: f64,
        weights: Vec<Array1<f64>>,
        positions: Vec<Array1<f64>>,
    ) {
        self.push(x.clone(), cost, Some(weights), Some(positions));
    }

    fn push(
        &self,
        x: Array1<f64>,
        cost: f64,
        weights: Option<Vec<Array1<f64>>>,
        positions: Option<Vec<Array1<f64>>>,
    ) {
        let step = {
            let mut store = self.store.lock().unwrap();
            let step = store.records.len();
            store.records.push(Record {
                step,
                x,
                cost,
                weights,
                positions,
            });
            step
        };
        if let Some(echo) = &self.echo {
            let mut echo = echo.lock().unwrap();
            if step % echo.stride == 0 {
                // echo failures are not worth aborting a solve over
                let _ = writeln!(echo.out, "step {:4}  f={:.6e}", step, cost);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only handle over the same store.
    pub fn reader(&self) -> MonitorReader {
        MonitorReader {
            store: self.store.clone(),
        }
    }

    /// Dump all records as `{output_dir}/{name}.csv` with columns
    /// `step,x0..xN,cost`; returns the file path written.
    pub fn save_to_csv(&self, output_dir: &str, name: &str) -> io::Result<String> {
        create_dir_all(output_dir)?;
        let filename = format!("{}/{}.csv", output_dir, name);
        let mut file = File::create(&filename)?;

        let store = self.store.lock().unwrap();
        if let Some(first) = store.records.first() {
            write!(file, "step,")?;
            for i in 0..first.x.len() {
                write!(file, "x{},", i)?;
            }
            writeln!(file, "cost")?;
            for record in store.records.iter() {
                write!(file, "{},", record.step)?;
                for &xi in record.x.iter() {
                    write!(file, "{:.16},", xi)?;
                }
                writeln!(file, "{:.16}", record.cost)?;
            }
        }
        Ok(filename)
    }
}

/// Read-only capability over a monitor's record store.
#[derive(Clone)]
pub struct MonitorReader {
    store: Arc<Mutex<Store>>,
}

impl MonitorReader {
    pub fn len(&self) -> usize {
        self.store.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot copy of every record.
    pub fn records(&self) -> Vec<Record> {
        self.store.lock().unwrap().records.clone()
    }

    /// Snapshot copy of the last `n` records (all of them if `None`).
    pub fn last(&self, n: Option<usize>) -> Vec<Record> {
        let store = self.store.lock().unwrap();
        let len = store.records.len();
        let skip = match n {
            Some(n) => len.saturating_sub(n),
            None => 0,
        };
        store.records[skip..].to_vec()
    }

    /// The last `n` recorded vectors as rows of an `(m, D)` array, where
    /// `m = min(n, len)`. Empty monitors yield a `(0, 0)` array.
    pub fn solutions(&self, last_n: Option<usize>) -> Array2<f64> {
        let records = self.last(last_n);
        let dim = records.first().map_or(0, |r| r.x.len());
        let mut out = Array2::zeros((records.len(), dim));
        for (k, record) in records.iter().enumerate() {
            out.row_mut(k).assign(&record.x);
        }
        out
    }

    /// The last `n` recorded costs.
    pub fn costs(&self, last_n: Option<usize>) -> Array1<f64> {
        Array1::from_iter(self.last(last_n).iter().map(|r| r.cost))
    }

    /// Per-generation product-measure weights from the last `n` records.
    /// Records without weights are skipped, so a shorter return than `n`
    /// means the window is not fully covered.
    pub fn weights(&self, last_n: Option<usize>) -> Vec<Vec<Array1<f64>>> {
        self.last(last_n)
            .into_iter()
            .filter_map(|r| r.weights)
            .collect()
    }

    /// Per-generation product-measure positions from the last `n` records.
    pub fn positions(&self, last_n: Option<usize>) -> Vec<Vec<Array1<f64>>> {
        self.last(last_n)
            .into_iter()
            .filter_map(|r| r.positions)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let monitor = Monitor::new();
        monitor.record(&array![1.0, 2.0], 5.0);
        monitor.record_step(&array![0.5, 1.0], 1.25);
        assert_eq!(monitor.len(), 2);

        let reader = monitor.reader();
        let records = reader.records();
        assert_eq!(records[0].step, 0);
        assert_eq!(records[0].cost, 5.0);
        assert_eq!(records[1].x, array![0.5, 1.0]);

        let solutions = reader.solutions(Some(1));
        assert_eq!(solutions.nrows(), 1);
        assert_eq!(solutions[[0, 0]], 0.5);
    }

    #[test]
    fn test_window_larger_than_history() {
        let monitor = Monitor::new();
        monitor.record(&array![1.0], 1.0);
        let reader = monitor.reader();
        assert_eq!(reader.solutions(Some(50)).nrows(), 1);
        assert_eq!(reader.costs(None).len(), 1);
    }

    #[test]
    fn test_verbose_echoes_every_kth_record() {
        let buf = SharedBuf::default();
        let monitor = Monitor::verbose(Box::new(buf.clone()), 2);
        for k in 0..5 {
            monitor.record(&array![k as f64], k as f64);
        }
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        // entries 0, 2 and 4
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("step    0"));
    }

    #[test]
    fn test_measures_roundtrip() {
        let monitor = Monitor::new();
        monitor.record_measures(
            &array![0.1, 0.9],
            0.0,
            vec![array![0.1, 0.9]],
            vec![array![-1.0, 1.0]],
        );
        monitor.record(&array![0.0, 0.0], 0.0);
        let reader = monitor.reader();
        assert_eq!(reader.weights(None).len(), 1);
        assert_eq!(reader.positions(Some(2)).len(), 1);
        assert_eq!(reader.weights(None)[0][0], array![0.1, 0.9]);
    }

    #[test]
    fn test_save_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = Monitor::new();
        monitor.record(&array![1.0, 2.0], 3.0);
        let path = monitor
            .save_to_csv(dir.path().to_str().unwrap(), "run")
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "step,x0,x1,cost");
        assert!(lines.next().unwrap().starts_with("0,1.0"));
    }
}
