use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};

use super::{FrameSink, RecorderError};
use crate::frame::Frame;

type OpenSegment = Box<dyn FnMut(&Path) -> Result<Box<dyn FrameSink>, RecorderError> + Send>;

/// Splits a long running recording into bounded files.
///
/// Each segment holds at most `segment_frames` frames. A segment that fails a write
/// is closed on the spot and the next frame starts a fresh file, so a broken
/// container never keeps growing.
pub struct SegmentedRecorder {
    base: PathBuf,
    session: String,
    segment_frames: u64,
    open_segment: OpenSegment,
    current: Option<Box<dyn FrameSink>>,
    frames_in_segment: u64,
    segments_opened: u32,
    finished: bool,
}

impl SegmentedRecorder {
    /// Opens the first segment right away so a bad output path surfaces at startup
    pub fn start<F>(
        base: impl Into<PathBuf>,
        segment_frames: u64,
        open_segment: F,
    ) -> Result<Self, RecorderError>
    where
        F: FnMut(&Path) -> Result<Box<dyn FrameSink>, RecorderError> + Send + 'static,
    {
        let session = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        Self::with_session(base, session, segment_frames, open_segment)
    }

    pub fn with_session<F>(
        base: impl Into<PathBuf>,
        session: String,
        segment_frames: u64,
        open_segment: F,
    ) -> Result<Self, RecorderError>
    where
        F: FnMut(&Path) -> Result<Box<dyn FrameSink>, RecorderError> + Send + 'static,
    {
        let mut recorder = Self {
            base: base.into(),
            session,
            segment_frames: segment_frames.max(1),
            open_segment: Box::new(open_segment),
            current: None,
            frames_in_segment: 0,
            segments_opened: 0,
            finished: false,
        };
        let first = recorder.open_next()?;
        recorder.current = Some(first);
        Ok(recorder)
    }

    /// `hive.avi` -> `hive-<session>-001.avi`
    fn segment_path(&self, index: u32) -> PathBuf {
        let stem = self
            .base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".into());
        let ext = self
            .base
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "avi".into());
        self.base
            .with_file_name(format!("{}-{}-{:03}.{}", stem, self.session, index, ext))
    }

    fn open_next(&mut self) -> Result<Box<dyn FrameSink>, RecorderError> {
        let index = self.segments_opened + 1;
        let path = self.segment_path(index);
        let sink = (self.open_segment)(&path)?;
        self.segments_opened = index;
        self.frames_in_segment = 0;
        info!(path = %path.display(), "Recording segment opened");
        Ok(sink)
    }

    fn close_current(&mut self) {
        if let Some(mut sink) = self.current.take() {
            if let Err(e) = sink.finish() {
                error!("Unable to close recording segment: {}", e);
            }
        }
    }
}

impl FrameSink for SegmentedRecorder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        if self.finished {
            return Err(RecorderError::Finished);
        }
        if self.frames_in_segment >= self.segment_frames {
            self.close_current();
        }
        let mut sink = match self.current.take() {
            Some(sink) => sink,
            None => self.open_next()?,
        };
        match sink.write_frame(frame) {
            Ok(()) => {
                self.frames_in_segment += 1;
                self.current = Some(sink);
                Ok(())
            }
            Err(e) => {
                warn!("Abandoning recording segment after failed write");
                if let Err(close) = sink.finish() {
                    warn!("Unable to close failed segment: {}", close);
                }
                Err(e)
            }
        }
    }

    fn finish(&mut self) -> Result<(), RecorderError> {
        self.finished = true;
        match self.current.take() {
            Some(mut sink) => sink.finish(),
            None => Ok(()),
        }
    }
}

impl Drop for SegmentedRecorder {
    fn drop(&mut self) {
        self.close_current();
    }
}

#[cfg(test)]
mod test {
    use std::{
        path::{Path, PathBuf},
        sync::{Arc, Mutex},
    };

    use super::SegmentedRecorder;
    use crate::{
        frame::{sample, Frame},
        recording::{FrameSink, RecorderError},
    };

    #[derive(Default)]
    struct Segment {
        path: PathBuf,
        frames: usize,
        finished: bool,
    }

    /// Shared view of every segment the recorder opened
    #[derive(Clone, Default)]
    struct Shelf(Arc<Mutex<Vec<Segment>>>);

    impl Shelf {
        fn summary(&self) -> Vec<(String, usize, bool)> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|s| (s.path.display().to_string(), s.frames, s.finished))
                .collect()
        }
    }

    /// Fails every write once `fail_after` frames went through
    struct ShelfSink {
        shelf: Shelf,
        slot: usize,
        fail_after: Option<usize>,
    }

    impl FrameSink for ShelfSink {
        fn write_frame(&mut self, _frame: &Frame) -> Result<(), RecorderError> {
            let mut segments = self.shelf.0.lock().unwrap();
            let segment = &mut segments[self.slot];
            if segment.finished {
                return Err(RecorderError::Finished);
            }
            if Some(segment.frames) == self.fail_after {
                return Err(RecorderError::Backend("disk full".into()));
            }
            segment.frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RecorderError> {
            self.shelf.0.lock().unwrap()[self.slot].finished = true;
            Ok(())
        }
    }

    fn recorder(
        shelf: &Shelf,
        segment_frames: u64,
        fail_after: Vec<Option<usize>>,
    ) -> SegmentedRecorder {
        let shelf = shelf.clone();
        let mut plan = fail_after.into_iter();
        SegmentedRecorder::with_session(
            "out/hive.avi",
            "20260101-000000".into(),
            segment_frames,
            move |path: &Path| {
                let mut segments = shelf.0.lock().unwrap();
                segments.push(Segment {
                    path: path.to_path_buf(),
                    ..Segment::default()
                });
                Ok(Box::new(ShelfSink {
                    shelf: shelf.clone(),
                    slot: segments.len() - 1,
                    fail_after: plan.next().flatten(),
                }) as Box<dyn FrameSink>)
            },
        )
        .unwrap()
    }

    #[test]
    fn test_rotates_before_segment_limit() {
        let shelf = Shelf::default();
        let mut rec = recorder(&shelf, 3, vec![]);
        for _ in 0..7 {
            rec.write_frame(&sample(8, 8)).unwrap();
        }
        rec.finish().unwrap();
        assert_eq!(
            shelf.summary(),
            vec![
                ("out/hive-20260101-000000-001.avi".to_string(), 3, true),
                ("out/hive-20260101-000000-002.avi".to_string(), 3, true),
                ("out/hive-20260101-000000-003.avi".to_string(), 1, true),
            ]
        );
    }

    #[test]
    fn test_failed_write_abandons_segment() {
        let shelf = Shelf::default();
        let mut rec = recorder(&shelf, 100, vec![Some(2)]);
        rec.write_frame(&sample(8, 8)).unwrap();
        rec.write_frame(&sample(8, 8)).unwrap();
        assert!(matches!(
            rec.write_frame(&sample(8, 8)),
            Err(RecorderError::Backend(_))
        ));
        // Nothing else lands in the broken file
        rec.write_frame(&sample(8, 8)).unwrap();
        rec.write_frame(&sample(8, 8)).unwrap();
        let summary = shelf.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!((summary[0].1, summary[0].2), (2, true));
        assert_eq!((summary[1].1, summary[1].2), (2, false));
    }

    #[test]
    fn test_finish_is_final_and_idempotent() {
        let shelf = Shelf::default();
        let mut rec = recorder(&shelf, 10, vec![]);
        rec.write_frame(&sample(8, 8)).unwrap();
        rec.finish().unwrap();
        rec.finish().unwrap();
        assert!(matches!(rec.write_frame(&sample(8, 8)), Err(RecorderError::Finished)));
        assert_eq!(shelf.summary().len(), 1);
    }

    #[test]
    fn test_drop_closes_open_segment() {
        let shelf = Shelf::default();
        {
            let mut rec = recorder(&shelf, 10, vec![]);
            rec.write_frame(&sample(8, 8)).unwrap();
        }
        assert!(shelf.summary()[0].2);
    }

    #[test]
    fn test_unopenable_first_segment_is_an_error() {
        let res = SegmentedRecorder::start("hive.avi", 10, |path: &Path| {
            Err(RecorderError::Open(path.display().to_string()))
        });
        assert!(matches!(res, Err(RecorderError::Open(_))));
    }

    #[test]
    fn test_segment_path_without_extension() {
        let shelf = Shelf::default();
        let rec = SegmentedRecorder::with_session("capture", "s".into(), 1, {
            let shelf = shelf.clone();
            move |path: &Path| {
                shelf.0.lock().unwrap().push(Segment {
                    path: path.to_path_buf(),
                    ..Segment::default()
                });
                Ok(Box::new(ShelfSink {
                    shelf: shelf.clone(),
                    slot: 0,
                    fail_after: None,
                }) as Box<dyn FrameSink>)
            }
        })
        .unwrap();
        drop(rec);
        assert_eq!(shelf.summary()[0].0, "capture-s-001.avi");
    }
}
