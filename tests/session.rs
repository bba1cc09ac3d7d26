//! Video session lifecycle and calibration against simulated hardware

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crtcal::config::{CalibrationConfig, MonitorCalibration};
use crtcal::drm::{ConnectorRecord, EncoderRecord, ModeResources};
use crtcal::fb::Geometry;
use crtcal::session::{apply_calibration, read_calibration, write_calibration};
use crtcal::{
    generate, Channel, CurveParams, FramebufferDevice, GraphicsCard, ModeSetting, Platform,
    VideoError, VideoSession,
};

// ============================================================================
// Simulated hardware
// ============================================================================

// Object ids derived from the CRTC id
const CONNECTOR_BASE: u32 = 100;
const ENCODER_BASE: u32 = 200;
const BLOB_BASE: u64 = 300;
const EDID_PROPERTY_ID: u32 = 1;

#[derive(Clone)]
struct FakeCrtc {
    id: u32,
    connected: bool,
    stops: usize,
    edid: Option<Vec<u8>>,
}

impl FakeCrtc {
    fn connected(id: u32, stops: usize) -> Self {
        Self {
            id,
            connected: true,
            stops,
            edid: None,
        }
    }

    fn unconnected(id: u32) -> Self {
        Self {
            connected: false,
            ..Self::connected(id, 256)
        }
    }
}

/// One card: every CRTC has its own connector and encoder
#[derive(Clone, Default)]
struct FakeCard {
    crtcs: Vec<FakeCrtc>,
    fail_gamma_size: Option<u32>,
    /// Hardware ramps by CRTC id, red ++ green ++ blue
    ramps: Rc<RefCell<HashMap<u32, Vec<u16>>>>,
}

impl FakeCard {
    fn with(crtcs: Vec<FakeCrtc>) -> Self {
        Self {
            crtcs,
            ..Default::default()
        }
    }

    fn crtc(&self, id: u32) -> io::Result<&FakeCrtc> {
        self.crtcs
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

impl ModeSetting for FakeCard {
    fn mode_resources(&self) -> io::Result<ModeResources> {
        Ok(ModeResources {
            crtcs: self.crtcs.iter().map(|c| c.id).collect(),
            connectors: self.crtcs.iter().map(|c| c.id + CONNECTOR_BASE).collect(),
        })
    }

    fn connector(&self, id: u32) -> io::Result<ConnectorRecord> {
        let crtc = self.crtc(id - CONNECTOR_BASE)?;
        let blob = if crtc.edid.is_some() {
            BLOB_BASE + crtc.id as u64
        } else {
            0
        };
        Ok(ConnectorRecord {
            id,
            connected: crtc.connected,
            encoder_id: Some(crtc.id + ENCODER_BASE),
            properties: vec![(EDID_PROPERTY_ID, blob)],
        })
    }

    fn encoder(&self, id: u32) -> io::Result<EncoderRecord> {
        let crtc = self.crtc(id - ENCODER_BASE)?;
        Ok(EncoderRecord {
            id,
            crtc_id: Some(crtc.id),
        })
    }

    fn gamma_size(&self, crtc_id: u32) -> io::Result<usize> {
        if self.fail_gamma_size == Some(crtc_id) {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        Ok(self.crtc(crtc_id)?.stops)
    }

    fn property_name(&self, property_id: u32) -> io::Result<String> {
        match property_id {
            EDID_PROPERTY_ID => Ok("EDID".to_string()),
            _ => Err(io::Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    fn property_blob(&self, blob_id: u64) -> io::Result<Vec<u8>> {
        let crtc = self.crtc((blob_id - BLOB_BASE) as u32)?;
        crtc.edid
            .clone()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn read_gamma(
        &self,
        crtc_id: u32,
        red: &mut [u16],
        green: &mut [u16],
        blue: &mut [u16],
    ) -> io::Result<()> {
        let ramps = self.ramps.borrow();
        let ramp = ramps
            .get(&crtc_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENODATA))?;
        let n = red.len();
        red.copy_from_slice(&ramp[..n]);
        green.copy_from_slice(&ramp[n..2 * n]);
        blue.copy_from_slice(&ramp[2 * n..]);
        Ok(())
    }

    fn write_gamma(&self, crtc_id: u32, red: &[u16], green: &[u16], blue: &[u16]) -> io::Result<()> {
        self.ramps
            .borrow_mut()
            .insert(crtc_id, [red, green, blue].concat());
        Ok(())
    }
}

#[derive(Default)]
struct FakePlatform {
    /// (width, height) per framebuffer
    framebuffers: Vec<(u32, u32)>,
    fail_framebuffer: Option<usize>,
    cards: Vec<FakeCard>,
    fail_card: Option<usize>,
}

fn scratch_path() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    std::env::temp_dir().join(format!(
        "crtcal-session-fb-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

impl Platform for FakePlatform {
    type Node = FakeCard;

    fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    fn open_framebuffer(&self, index: usize) -> crtcal::Result<FramebufferDevice> {
        let path = scratch_path();
        if self.fail_framebuffer == Some(index) {
            return Err(VideoError::DeviceOpen {
                path,
                source: io::Error::from_raw_os_error(libc::EACCES),
            });
        }

        let (width, height) = self.framebuffers[index];
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        let len = (width * height * 4) as usize;
        file.set_len(len as u64).unwrap();
        let geometry = Geometry {
            width,
            height,
            bytes_per_pixel: 4,
            line_length: width * 4,
            origin: 0,
        };
        let fb = FramebufferDevice::from_file(index, &path, file, geometry, len);
        let _ = std::fs::remove_file(&path);
        fb
    }

    fn card_count(&self) -> usize {
        self.cards.len()
    }

    fn open_card(&self, index: usize) -> crtcal::Result<GraphicsCard<FakeCard>> {
        if self.fail_card == Some(index) {
            return Err(VideoError::DeviceOpen {
                path: PathBuf::from(format!("/dev/dri/card{}", index)),
                source: io::Error::from_raw_os_error(libc::ENOENT),
            });
        }
        GraphicsCard::from_node(index, self.cards[index].clone())
    }
}

fn assert_released(session: &VideoSession<FakePlatform>) {
    assert!(!session.is_acquired());
    assert_eq!(session.framebuffer_count(), 0);
    assert_eq!(session.card_count(), 0);
    assert_eq!(session.crtc_count(), 0);
    for channel in Channel::ALL {
        assert!(session.brightness(channel).is_empty());
        assert!(session.contrast(channel).is_empty());
        assert!(session.gamma(channel).is_empty());
    }
}

fn ramp(stops: usize, params: CurveParams) -> Vec<u16> {
    let mut buf = vec![0u16; stops];
    generate(&mut buf, &params);
    buf
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_acquire_empty_host() {
    let mut session = VideoSession::new(FakePlatform::default());
    session.acquire().unwrap();
    assert!(session.is_acquired());
    assert_eq!(session.framebuffer_count(), 0);
    assert_eq!(session.card_count(), 0);
    assert_eq!(session.crtc_count(), 0);
    for channel in Channel::ALL {
        assert!(session.gamma(channel).is_empty());
    }

    session.release();
    assert_released(&session);
}

#[test]
fn test_release_twice() {
    let platform = FakePlatform {
        framebuffers: vec![(8, 4)],
        cards: vec![FakeCard::with(vec![FakeCrtc::connected(1, 16)])],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();
    assert_eq!(session.crtc_count(), 1);

    session.release();
    assert_released(&session);
    session.release();
    assert_released(&session);

    // Released sessions can be acquired again
    session.acquire().unwrap();
    assert_eq!(session.crtc_count(), 1);
}

#[test]
fn test_release_without_acquire() {
    let mut session = VideoSession::new(FakePlatform::default());
    session.release();
    assert_released(&session);
}

#[test]
fn test_unconnected_crtcs_are_excluded() {
    let platform = FakePlatform {
        cards: vec![
            FakeCard::with(vec![
                FakeCrtc::connected(1, 256),
                FakeCrtc::unconnected(2),
                FakeCrtc::connected(3, 1024),
            ]),
            FakeCard::with(vec![FakeCrtc::unconnected(4), FakeCrtc::connected(5, 16)]),
        ],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();

    let ids: Vec<u32> = session.crtcs().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![1, 3, 5]);
    let cards: Vec<usize> = session.crtcs().iter().map(|c| c.card_index()).collect();
    assert_eq!(cards, vec![0, 0, 1]);
    assert_eq!(session.crtc(1).map(|c| c.stops()), Some(1024));
    assert_eq!(session.card_of(2).map(|c| c.index()).ok(), Some(1));

    for channel in Channel::ALL {
        assert_eq!(session.brightness(channel), &[0.0; 3]);
        assert_eq!(session.contrast(channel), &[1.0; 3]);
        assert_eq!(session.gamma(channel), &[1.0; 3]);
    }
    assert_eq!(
        session.params(Channel::Green, 2),
        Some(CurveParams::default())
    );
    assert_eq!(session.params(Channel::Green, 3), None);
}

#[test]
fn test_acquire_twice_is_refused() {
    let mut session = VideoSession::new(FakePlatform::default());
    session.acquire().unwrap();
    assert!(matches!(session.acquire(), Err(VideoError::AlreadyAcquired)));
}

// ============================================================================
// Partial acquisition
// ============================================================================

#[test]
fn test_card_failure_leaves_partial_state() {
    let platform = FakePlatform {
        framebuffers: vec![(4, 4), (4, 4)],
        cards: vec![
            FakeCard::with(vec![FakeCrtc::connected(1, 16)]),
            FakeCard::with(vec![FakeCrtc::connected(2, 16)]),
        ],
        fail_card: Some(1),
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);

    let err = session.acquire().unwrap_err();
    assert!(matches!(err, VideoError::DeviceOpen { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));

    // Nothing is rolled back until release
    assert!(session.is_acquired());
    assert_eq!(session.framebuffer_count(), 2);
    assert!(session.framebuffers().iter().all(|fb| fb.is_open()));
    assert_eq!(session.card_count(), 1);
    assert_eq!(session.crtc_count(), 1);
    assert_eq!(session.crtc(0).map(|c| c.id()), Some(1));
    // State arrays are only allocated once every card is processed
    assert!(session.gamma(Channel::Red).is_empty());
    assert!(matches!(
        session.set_params(Channel::Red, 0, CurveParams::default()),
        Err(VideoError::NoSuchOutput(0))
    ));

    assert!(matches!(session.acquire(), Err(VideoError::AlreadyAcquired)));
    session.release();
    assert_released(&session);
}

#[test]
fn test_crtc_failure_keeps_open_card() {
    let mut card = FakeCard::with(vec![FakeCrtc::connected(1, 16), FakeCrtc::connected(2, 16)]);
    card.fail_gamma_size = Some(2);
    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);

    let err = session.acquire().unwrap_err();
    assert!(matches!(err, VideoError::ResourceQuery { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::EIO));
    assert_eq!(session.card_count(), 1);
    assert!(session.cards()[0].is_open());
    assert_eq!(session.crtc_count(), 1);

    session.release();
    assert_released(&session);
}

#[test]
fn test_framebuffer_failure_stops_before_cards() {
    let platform = FakePlatform {
        framebuffers: vec![(4, 4), (4, 4), (4, 4)],
        fail_framebuffer: Some(1),
        cards: vec![FakeCard::with(vec![FakeCrtc::connected(1, 16)])],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);

    let err = session.acquire().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EACCES));
    assert_eq!(session.framebuffer_count(), 1);
    assert_eq!(session.card_count(), 0);

    session.release();
    assert_released(&session);
}

// ============================================================================
// Gamma I/O and calibration
// ============================================================================

#[test]
fn test_gamma_io_by_position() {
    let card = FakeCard::with(vec![FakeCrtc::connected(7, 4)]);
    let hardware = Rc::clone(&card.ramps);
    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();

    let crtc = session.crtc_mut(0).unwrap();
    crtc.channel_mut(Channel::Blue).copy_from_slice(&[1, 2, 3, 4]);
    session.set_gamma(0).unwrap();
    assert_eq!(
        hardware.borrow().get(&7),
        Some(&vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4])
    );

    hardware.borrow_mut().insert(7, (0..12).collect());
    session.get_gamma(0).unwrap();
    assert_eq!(session.crtc(0).unwrap().green(), &[4, 5, 6, 7]);

    assert!(matches!(session.get_gamma(1), Err(VideoError::NoSuchOutput(1))));
    assert!(matches!(session.set_gamma(1), Err(VideoError::NoSuchOutput(1))));
}

#[test]
fn test_crtc_refuses_card_from_other_session() {
    let platform = || FakePlatform {
        cards: vec![FakeCard::with(vec![FakeCrtc::connected(1, 4)])],
        ..Default::default()
    };
    let mut first = VideoSession::new(platform());
    let second_platform = platform();
    let hardware = Rc::clone(&second_platform.cards[0].ramps);
    let mut second = VideoSession::new(second_platform);
    first.acquire().unwrap();
    second.acquire().unwrap();

    let other_card = &second.cards()[0];
    let crtc = first.crtc_mut(0).unwrap();
    assert_eq!(crtc.card_index(), other_card.index());
    assert!(matches!(
        crtc.get_gamma(other_card),
        Err(VideoError::CardMismatch { .. })
    ));
    assert!(matches!(
        crtc.set_gamma(other_card),
        Err(VideoError::CardMismatch { .. })
    ));
    assert!(hardware.borrow().is_empty());

    // Each session still drives its own card
    first.set_gamma(0).unwrap();
    second.set_gamma(0).unwrap();
    assert!(hardware.borrow().contains_key(&1));
}

#[test]
fn test_read_calibration() {
    let curves = [
        CurveParams::new(2.2, 0.9, 0.05),
        CurveParams::new(1.8, 1.0, 0.0),
        CurveParams::new(1.0, 0.8, 0.1),
    ];
    let card = FakeCard::with(vec![FakeCrtc::connected(1, 256)]);
    let hardware: Vec<u16> = curves.iter().flat_map(|&p| ramp(256, p)).collect();
    card.ramps.borrow_mut().insert(1, hardware);

    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();
    read_calibration(&mut session).unwrap();

    for channel in Channel::ALL {
        let expected = curves[channel.index()];
        let got = session.params(channel, 0).unwrap();
        assert!(
            (got.gamma - expected.gamma).abs() < 0.05,
            "{}: gamma {} vs {}",
            channel.name(),
            got.gamma,
            expected.gamma
        );
        assert!((got.contrast - expected.contrast).abs() < 0.01);
        assert!((got.brightness - expected.brightness).abs() < 2.0 / 65535.0);
    }
}

#[test]
fn test_read_calibration_skips_degenerate_ramps() {
    let card = FakeCard::with(vec![FakeCrtc::connected(1, 8), FakeCrtc::connected(2, 1)]);
    // Flat red channel, linear green and blue
    let mut flat = vec![0x8000u16; 8];
    flat.extend(ramp(8, CurveParams::default()));
    flat.extend(ramp(8, CurveParams::default()));
    card.ramps.borrow_mut().insert(1, flat);
    card.ramps.borrow_mut().insert(2, vec![0xFFFF; 3]);

    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();
    session.gamma_mut(Channel::Red)[0] = 3.0;
    read_calibration(&mut session).unwrap();

    // Degenerate red keeps its previous value
    assert_eq!(session.gamma(Channel::Red)[0], 3.0);
    assert!((session.gamma(Channel::Green)[0] - 1.0).abs() < 0.2);
    // Single-stop ramp is never analysed
    assert_eq!(session.params(Channel::Red, 1), Some(CurveParams::default()));
}

#[test]
fn test_apply_calibration_with_monitor_override() {
    let edid = vec![0x00, 0xFF, 0xAB];
    let mut with_edid = FakeCrtc::connected(1, 64);
    with_edid.edid = Some(edid);
    let card = FakeCard::with(vec![with_edid, FakeCrtc::connected(2, 64)]);
    let hardware = Rc::clone(&card.ramps);
    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();
    assert_eq!(session.crtc(0).and_then(|c| c.edid()), Some("00FFAB"));
    assert_eq!(session.crtc(1).and_then(|c| c.edid()), None);

    let config = CalibrationConfig {
        gamma: [1.5; 3],
        monitors: vec![MonitorCalibration {
            edid: "00ffab".to_string(),
            gamma: [2.2, 2.0, 1.8],
            contrast: [0.9; 3],
            brightness: [0.1; 3],
        }],
        ..Default::default()
    };
    apply_calibration(&mut session, &config).unwrap();

    let monitor: Vec<u16> = [2.2, 2.0, 1.8]
        .iter()
        .flat_map(|&g| ramp(64, CurveParams::new(g, 0.9, 0.1)))
        .collect();
    let default: Vec<u16> = ramp(64, CurveParams::new(1.5, 1.0, 0.0)).repeat(3);
    assert_eq!(hardware.borrow().get(&1), Some(&monitor));
    assert_eq!(hardware.borrow().get(&2), Some(&default));

    assert_eq!(session.gamma(Channel::Blue), &[1.8, 1.5]);
    assert_eq!(session.contrast(Channel::Red), &[0.9, 1.0]);
}

#[test]
fn test_write_calibration_rejects_invalid_gamma() {
    let card = FakeCard::with(vec![FakeCrtc::connected(1, 16)]);
    let hardware = Rc::clone(&card.ramps);
    let platform = FakePlatform {
        cards: vec![card],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();

    session.gamma_mut(Channel::Green)[0] = 0.0;
    let err = write_calibration(&mut session).unwrap_err();
    assert!(matches!(err, VideoError::InvalidCurve { .. }));
    assert!(hardware.borrow().get(&1).is_none());
}

#[test]
fn test_pattern_on_session_framebuffers() {
    let platform = FakePlatform {
        framebuffers: vec![(42, 8)],
        ..Default::default()
    };
    let mut session = VideoSession::new(platform);
    session.acquire().unwrap();

    let fb = &mut session.framebuffers_mut()[0];
    fb.draw_level_bars().unwrap();
    assert_eq!(fb.read_pixel(41, 0), Some(crtcal::fb::colour(255, 255, 255)));
    assert_eq!(fb.read_pixel(2, 7), Some(crtcal::fb::colour(0, 0, 17)));
}
