#[cfg(test)]
mod tests {
    use simo_core::{CommandChannel, SensorData, SimoError};
    use simo_device::*;
    use std::time::Duration;

    // ── Protocol ───────────────────────────────────────────────

    mod protocol {
        use super::*;

        #[test]
        fn test_distance_in_tenths() {
            let frame: ControllerFrame = "DIST,253".parse().unwrap();
            assert_eq!(frame, ControllerFrame::Distance { cm: 25.3 });
        }

        #[test]
        fn test_infrared() {
            let frame: ControllerFrame = "IR,L0R1".parse().unwrap();
            assert_eq!(frame, ControllerFrame::Infrared { left: 0, right: 1 });
        }

        #[test]
        fn test_combined_sensor_frame() {
            let frame: ControllerFrame = "SENSOR,D1200,L1R1".parse().unwrap();
            assert_eq!(
                frame,
                ControllerFrame::Sensor {
                    distance_cm: Some(120.0),
                    infrared: Some((1, 1)),
                }
            );
        }

        #[test]
        fn test_acks_faults_and_pong() {
            assert_eq!(
                "OK,F".parse::<ControllerFrame>().unwrap(),
                ControllerFrame::Ack { detail: "F".into() }
            );
            assert_eq!(
                "ERR,busy".parse::<ControllerFrame>().unwrap(),
                ControllerFrame::Fault {
                    detail: "busy".into()
                }
            );
            assert_eq!("PONG\r".parse::<ControllerFrame>().unwrap(), ControllerFrame::Pong);
        }

        #[test]
        fn test_malformed_lines() {
            for line in ["", "DIST", "DIST,abc", "IR,L2", "SENSOR,X", "HELLO,1"] {
                let err = line.parse::<ControllerFrame>().unwrap_err();
                assert!(matches!(err, SimoError::MalformedFrame(_)), "{line}");
            }
        }

        #[test]
        fn test_frame_serializes_tagged() {
            let json = serde_json::to_value(ControllerFrame::Distance { cm: 9.5 }).unwrap();
            assert_eq!(json["frame"], "distance");
            assert_eq!(json["cm"], 9.5);
        }
    }

    // ── Sensor cache ───────────────────────────────────────────

    mod cache {
        use super::*;

        #[test]
        fn test_partial_frames_merge() {
            let mut cache = SensorCache::new();
            assert_eq!(cache.data(), SensorData::default());

            cache.apply(&ControllerFrame::Distance { cm: 40.0 });
            cache.apply(&ControllerFrame::Infrared { left: 0, right: 1 });
            let data = cache.data();
            assert_eq!(data.ultrasonic.distance, Some(40.0));
            assert_eq!(data.infrared.left, Some(0));

            cache.apply(&ControllerFrame::Sensor {
                distance_cm: Some(12.5),
                infrared: None,
            });
            let data = cache.data();
            assert_eq!(data.ultrasonic.distance, Some(12.5));
            assert_eq!(data.infrared.right, Some(1));
        }

        #[test]
        fn test_non_sensor_frames_ignored() {
            let mut cache = SensorCache::new();
            cache.apply(&ControllerFrame::Pong);
            cache.apply(&ControllerFrame::Fault { detail: "x".into() });
            assert_eq!(cache.data(), SensorData::default());
        }
    }

    // ── Recording channel ──────────────────────────────────────

    mod recording {
        use super::*;

        #[test]
        fn test_records_in_order() {
            let channel = RecordingChannel::new();
            assert!(channel.send("F,800"));
            assert!(channel.send("S"));
            assert_eq!(channel.sent(), vec!["F,800", "S"]);
            assert_eq!(channel.last_sent().as_deref(), Some("S"));
            assert!(channel.status().connected);
        }

        #[test]
        fn test_disconnected_refuses() {
            let channel = RecordingChannel::disconnected();
            assert!(!channel.send("F,800"));
            assert!(!channel.send_raw(b"S\n"));
            assert!(channel.sent().is_empty());

            channel.set_connected(true);
            assert!(channel.send("S"));
        }

        #[test]
        fn test_clones_share_history() {
            let channel = RecordingChannel::new();
            let other = channel.clone();
            other.send("BEEP");
            assert_eq!(channel.sent(), vec!["BEEP"]);
            channel.clear();
            assert!(other.sent().is_empty());
        }

        #[test]
        fn test_sensor_data_is_settable() {
            let channel = RecordingChannel::new();
            let mut data = SensorData::default();
            data.ultrasonic.distance = Some(8.0);
            channel.set_sensors(data);
            assert_eq!(channel.sensor_data().ultrasonic.distance, Some(8.0));
        }
    }

    // ── TCP link ───────────────────────────────────────────────

    mod link {
        use super::*;
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        fn options(address: String) -> LinkOptions {
            LinkOptions {
                address,
                reconnect: Duration::from_millis(50),
                poll_interval: Duration::from_millis(100),
            }
        }

        async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
            for _ in 0..100 {
                if done() {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            false
        }

        #[tokio::test]
        async fn test_send_fails_while_down() {
            // bind then drop so nothing listens on the port
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap().to_string();
            drop(listener);

            let link = TcpLink::spawn(options(address));
            assert!(!link.send("F,800"));
            assert!(!link.status().connected);
            link.shutdown();
        }

        #[tokio::test]
        async fn test_commands_and_sensor_frames() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap().to_string();
            let link = TcpLink::spawn(options(address.clone()));
            assert_eq!(link.address(), address);

            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut lines = BufReader::new(reader).lines();

            assert!(wait_until(|| link.is_connected()).await);
            assert!(link.send("F,800"));

            let mut seen = Vec::new();
            let got_command = tokio::time::timeout(Duration::from_secs(2), async {
                while let Ok(Some(line)) = lines.next_line().await {
                    let done = line == "F,800";
                    seen.push(line);
                    if done {
                        break;
                    }
                }
            })
            .await;
            assert!(got_command.is_ok());
            assert_eq!(seen.first().map(String::as_str), Some("PING"));

            writer.write_all(b"SENSOR,D355,L1R0\n").await.unwrap();
            assert!(
                wait_until(|| link.sensor_data().ultrasonic.distance == Some(35.5)).await
            );
            assert_eq!(link.sensor_data().infrared.right, Some(0));

            link.shutdown();
            assert!(!link.send("S"));
        }

        #[tokio::test]
        async fn test_polls_for_sensors() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let link = TcpLink::spawn(options(listener.local_addr().unwrap().to_string()));
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();

            let polled = tokio::time::timeout(Duration::from_secs(2), async {
                while let Ok(Some(line)) = lines.next_line().await {
                    if line == "SENSOR" {
                        return true;
                    }
                }
                false
            })
            .await;
            assert_eq!(polled.ok(), Some(true));
            link.shutdown();
        }

        #[tokio::test]
        async fn test_reconnects_after_drop() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let link = TcpLink::spawn(options(listener.local_addr().unwrap().to_string()));

            let (first, _) = listener.accept().await.unwrap();
            assert!(wait_until(|| link.is_connected()).await);
            drop(first);

            let second = tokio::time::timeout(Duration::from_secs(2), listener.accept()).await;
            assert!(second.is_ok());
            assert!(wait_until(|| link.is_connected()).await);
            link.shutdown();
        }
    }
}
