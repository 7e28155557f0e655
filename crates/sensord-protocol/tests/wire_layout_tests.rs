// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fixed sizes and codes that unmodified clients depend on

use sensord_protocol::*;
use std::io::Cursor;

#[test]
fn struct_sizes_match_c_layout() {
    assert_eq!(PACKET_HEADER_SIZE, 16);
    assert_eq!(SensorData::SIZE, 88);
    assert_eq!(SensorEvent::SIZE, 104);
    assert_eq!(SensorhubData::SIZE, 4120);
    assert_eq!(SensorhubEvent::SIZE, 4136);
    assert_eq!(EventChannelReady::SIZE, 8);
}

#[test]
fn command_codes_are_stable() {
    assert_eq!(CommandCode::Done as i32, -1);
    assert_eq!(CommandCode::GetId as i32, 1);
    assert_eq!(CommandCode::Hello as i32, 3);
    assert_eq!(CommandCode::SetInterval as i32, 10);
    assert_eq!(CommandCode::SendSensorhubData as i32, 14);
}

#[test]
fn poll_intervals_are_stable() {
    assert_eq!(
        [
            POLL_100HZ_MS,
            POLL_50HZ_MS,
            POLL_25HZ_MS,
            POLL_20HZ_MS,
            POLL_10HZ_MS,
            POLL_5HZ_MS,
            POLL_1HZ_MS
        ],
        [10, 20, 40, 50, 100, 200, 1000]
    );
    assert_eq!(SENSOR_INTERVAL_NORMAL_MS, 1000);
}

#[test]
fn request_stream_parses_in_order() {
    let mut stream = Vec::new();
    let requests = [
        Command::GetId { pid: 100 },
        Command::Hello {
            client_id: 1,
            sensor: SensorId::new(SensorType::Accelerometer, 0),
        },
        Command::Register {
            event_type: EventType::raw_data(SensorType::Accelerometer),
        },
        Command::SetInterval { interval_ms: 100 },
        Command::Start,
    ];
    for request in &requests {
        write_packet(&mut stream, &request.to_packet()).unwrap();
    }

    let mut cursor = Cursor::new(stream);
    for expected in &requests {
        let packet = read_packet(&mut cursor, 4096).unwrap();
        assert_eq!(&Command::from_packet(&packet).unwrap(), expected);
    }
    assert!(matches!(
        read_packet(&mut cursor, 4096),
        Err(ProtocolError::Disconnected)
    ));
}
