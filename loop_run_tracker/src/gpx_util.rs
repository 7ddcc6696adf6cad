use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::Path,
    str::FromStr,
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use loop_run_lib::{Coordinate, PositionSample};
use time::OffsetDateTime;

use crate::TrackerError;

pub fn read_gpx_file(path: &Path) -> Result<Vec<PositionSample>, TrackerError> {
    let file = File::open(path)?;
    read_gpx(BufReader::new(file))
}

/// Every track point of every track and segment, in document order.
pub fn read_gpx<R: Read>(reader: R) -> Result<Vec<PositionSample>, TrackerError> {
    let gpx = gpx::read(reader).map_err(|err| TrackerError::Gpx(err.to_string()))?;

    let mut samples = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let mut sample = PositionSample::new(Coordinate::from(point.point()));
                if let Some(timestamp) = point.time.and_then(parse_time) {
                    sample = sample.with_timestamp(timestamp);
                }
                samples.push(sample);
            }
        }
    }

    Ok(samples)
}

fn parse_time(time: Time) -> Option<DateTime<Utc>> {
    let formatted = time.format().ok()?;
    DateTime::from_str(&formatted).ok()
}

fn to_gpx_time(timestamp: DateTime<Utc>) -> Time {
    let time: SystemTime = timestamp.into();
    let time: OffsetDateTime = time.into();
    Time::from(time)
}

/// Writes `path` as a single-segment GPX 1.1 track.
pub fn write_gpx<W: Write>(
    name: &str,
    start_time: Option<DateTime<Utc>>,
    path: &[Coordinate],
    writer: W,
) -> Result<(), TrackerError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("loop_run".into()),
        ..Default::default()
    };

    gpx.metadata = Some(gpx::Metadata {
        name: Some(name.into()),
        time: start_time.map(to_gpx_time),
        ..Default::default()
    });

    let mut segment = TrackSegment::new();
    segment
        .points
        .extend(path.iter().map(|coordinate| Waypoint::new((*coordinate).into())));

    let mut track = Track::new();
    track.name = Some(name.into());
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer).map_err(|err| TrackerError::Gpx(err.to_string()))
}

pub fn write_gpx_file(
    name: &str,
    start_time: Option<DateTime<Utc>>,
    path: &[Coordinate],
    file: &Path,
) -> Result<(), TrackerError> {
    let file = File::create(file)?;
    write_gpx(name, start_time, path, std::io::BufWriter::new(file))
}
