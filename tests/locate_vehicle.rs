// 该文件是 Cheying （车影） 项目的一部分。
// tests/locate_vehicle.rs - 车辆定位测试
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{cell::RefCell, convert::Infallible, rc::Rc};

use cheying::{
  frame::RgbFrame,
  locator::{LocateError, VehicleBox, locate_vehicle, locate_vehicle_raw},
  model::{CocoLabel, DetectItem, DetectResult, Model, WithLabel},
  output::Render,
  task::{LocateTask, Task},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// 返回固定检测结果的检测器
struct FixedDetector {
  items: Vec<DetectItem<CocoLabel>>,
}

impl FixedDetector {
  fn new(items: &[(CocoLabel, [f32; 4])]) -> Self {
    let items = items
      .iter()
      .map(|&(kind, bbox)| DetectItem {
        kind,
        score: 0.9,
        bbox,
      })
      .collect();
    Self { items }
  }
}

impl Model for FixedDetector {
  type Input = RgbFrame;
  type Output = DetectResult<CocoLabel>;
  type Error = Infallible;

  fn infer(&self, _input: &RgbFrame) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult::new(self.items.clone()))
  }
}

struct FailingDetector;

impl Model for FailingDetector {
  type Input = RgbFrame;
  type Output = DetectResult<CocoLabel>;
  type Error = std::io::Error;

  fn infer(&self, _input: &RgbFrame) -> Result<Self::Output, Self::Error> {
    Err(std::io::Error::other("NPU 不可用"))
  }
}

#[derive(Clone, Default)]
struct Recorder {
  boxes: Rc<RefCell<Vec<VehicleBox>>>,
}

impl Render<RgbFrame, VehicleBox> for Recorder {
  type Error = Infallible;

  fn render_result(&self, _frame: &RgbFrame, result: &VehicleBox) -> Result<(), Self::Error> {
    self.boxes.borrow_mut().push(*result);
    Ok(())
  }
}

fn blank_frame(width: usize, height: usize) -> RgbFrame {
  RgbFrame::from_raw(height, width, 3, vec![0; width * height * 3]).unwrap()
}

#[test]
fn no_detections_returns_full_image() {
  let detector = FixedDetector::new(&[]);
  let vehicle = locate_vehicle(&detector, &blank_frame(320, 240)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 320, 240));
}

#[test]
fn largest_car_wins() {
  let detector = FixedDetector::new(&[
    (CocoLabel::CAR, [10.0, 10.0, 50.0, 50.0]),
    (CocoLabel::CAR, [0.0, 0.0, 100.0, 100.0]),
  ]);
  let vehicle = locate_vehicle(&detector, &blank_frame(200, 200)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 100, 100));
}

#[test]
fn trucks_count_as_vehicles() {
  let detector = FixedDetector::new(&[
    (CocoLabel::CAR, [10.0, 10.0, 50.0, 50.0]),
    (CocoLabel::TRUCK, [20.0, 30.0, 180.0, 150.0]),
  ]);
  let vehicle = locate_vehicle(&detector, &blank_frame(200, 200)).unwrap();
  assert_eq!(vehicle.as_tuple(), (20, 30, 180, 150));
}

#[test]
fn person_only_returns_full_image() {
  let detector = FixedDetector::new(&[(CocoLabel::PERSON, [5.0, 5.0, 60.0, 120.0])]);
  let vehicle = locate_vehicle(&detector, &blank_frame(128, 128)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 128, 128));
}

#[test]
fn other_classes_are_ignored() {
  let bus = CocoLabel::from_label_id(5);
  let detector = FixedDetector::new(&[
    (bus, [0.0, 0.0, 120.0, 120.0]),
    (CocoLabel::CAR, [40.0, 40.0, 60.0, 60.0]),
  ]);
  let vehicle = locate_vehicle(&detector, &blank_frame(128, 128)).unwrap();
  assert_eq!(vehicle.as_tuple(), (40, 40, 60, 60));
}

#[test]
fn equal_areas_keep_first_detection() {
  let detector = FixedDetector::new(&[
    (CocoLabel::TRUCK, [0.0, 0.0, 40.0, 40.0]),
    (CocoLabel::CAR, [50.0, 50.0, 90.0, 90.0]),
  ]);
  let vehicle = locate_vehicle(&detector, &blank_frame(100, 100)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 40, 40));
}

#[test]
fn boxes_outside_the_image_are_clamped() {
  let detector = FixedDetector::new(&[(CocoLabel::CAR, [-20.5, 10.7, 400.0, 90.2])]);
  let vehicle = locate_vehicle(&detector, &blank_frame(300, 100)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 10, 300, 90));
}

#[test]
fn degenerate_boxes_fall_back() {
  let detector = FixedDetector::new(&[
    (CocoLabel::CAR, [500.0, 500.0, 600.0, 600.0]),
    (CocoLabel::CAR, [10.2, 10.0, 10.8, 40.0]),
  ]);
  let vehicle = locate_vehicle(&detector, &blank_frame(100, 100)).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 100, 100));
}

#[test]
fn random_detections_stay_inside_the_image() {
  let mut rng = StdRng::seed_from_u64(42);
  let labels = [CocoLabel::PERSON, CocoLabel::CAR, CocoLabel::TRUCK];

  for _ in 0..200 {
    let width = rng.gen_range(1..400usize);
    let height = rng.gen_range(1..400usize);
    let count = rng.gen_range(0..6);
    let items: Vec<(CocoLabel, [f32; 4])> = (0..count)
      .map(|_| {
        let x0 = rng.gen_range(-100.0..500.0f32);
        let y0 = rng.gen_range(-100.0..500.0f32);
        let bbox = [
          x0,
          y0,
          x0 + rng.gen_range(-10.0..300.0f32),
          y0 + rng.gen_range(-10.0..300.0f32),
        ];
        (labels[rng.gen_range(0..labels.len())], bbox)
      })
      .collect();

    let detector = FixedDetector::new(&items);
    let vehicle = locate_vehicle(&detector, &blank_frame(width, height)).unwrap();
    let (left, top, right, bottom) = vehicle.as_tuple();
    assert!(left < right && right <= width as u32, "{:?} {}", vehicle, width);
    assert!(top < bottom && bottom <= height as u32, "{:?} {}", vehicle, height);
  }
}

#[test]
fn invalid_buffers_are_rejected() {
  let detector = FixedDetector::new(&[]);
  let cases = [
    (4, 4, 1, vec![0; 16]),
    (4, 4, 4, vec![0; 64]),
    (4, 4, 3, vec![0; 47]),
    (0, 4, 3, vec![]),
    (usize::MAX / 2, 3, 3, vec![0; 12]),
  ];
  for (height, width, channels, data) in cases {
    let err = locate_vehicle_raw(&detector, height, width, channels, data).unwrap_err();
    assert!(matches!(err, LocateError::InvalidImage(_)));
  }

  let vehicle = locate_vehicle_raw(&detector, 4, 6, 3, vec![0; 72]).unwrap();
  assert_eq!(vehicle.as_tuple(), (0, 0, 6, 4));
}

#[test]
fn detector_errors_are_propagated() {
  let err = locate_vehicle(&FailingDetector, &blank_frame(8, 8)).unwrap_err();
  assert!(matches!(err, LocateError::Detector(_)));
}

#[test]
fn task_renders_every_frame() {
  let detector = FixedDetector::new(&[(CocoLabel::CAR, [1.0, 2.0, 30.0, 20.0])]);
  let recorder = Recorder::default();
  let frames = vec![blank_frame(64, 48), blank_frame(32, 32), blank_frame(16, 16)];

  LocateTask::default()
    .run_task(frames.into_iter(), detector, recorder.clone())
    .unwrap();

  let boxes = recorder.boxes.borrow();
  assert_eq!(
    boxes.iter().map(VehicleBox::as_tuple).collect::<Vec<_>>(),
    vec![(1, 2, 30, 20), (1, 2, 30, 20), (1, 2, 16, 16)]
  );
}

#[test]
fn task_stops_at_frame_number() {
  let recorder = Recorder::default();
  let frames = std::iter::repeat_with(|| blank_frame(10, 10)).take(5);

  LocateTask::default()
    .with_frame_number(Some(2))
    .run_task(frames, FixedDetector::new(&[]), recorder.clone())
    .unwrap();
  assert_eq!(recorder.boxes.borrow().len(), 2);
}

#[test]
fn task_without_frames_fails() {
  let result = LocateTask::default().run_task(
    std::iter::empty::<RgbFrame>(),
    FixedDetector::new(&[]),
    Recorder::default(),
  );
  assert!(result.is_err());
}
