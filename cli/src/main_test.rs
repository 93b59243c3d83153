use super::*;

#[test]
fn ws_url_maps_http_schemes_to_ws() {
    assert_eq!(ws_url("http://127.0.0.1:3000").unwrap(), "ws://127.0.0.1:3000/api/ws");
    assert_eq!(ws_url("https://board.example/").unwrap(), "wss://board.example/api/ws");
    assert_eq!(ws_url("ws://localhost:3000").unwrap(), "ws://localhost:3000/api/ws");
}

#[test]
fn ws_url_rejects_unknown_scheme() {
    assert!(matches!(ws_url("ftp://host"), Err(CliError::InvalidBaseUrl(_))));
    assert!(matches!(ws_url("http://"), Err(CliError::InvalidBaseUrl(_))));
}

#[test]
fn backoff_doubles_up_to_cap_and_resets() {
    let mut backoff = Backoff::default();
    let delays: Vec<u128> = (0..8).map(|_| backoff.next_delay().as_millis()).collect();
    assert_eq!(delays, vec![250, 500, 1000, 2000, 4000, 8000, 8000, 8000]);

    backoff.reset();
    assert_eq!(backoff.next_delay(), Duration::from_millis(250));
}

#[test]
fn parse_script_reads_records_in_order() {
    let input = concat!(
        r##"{"type":"start","x":10,"y":10,"tool":1,"color":"#000000","lineWidth":2}"##,
        "\n\n",
        r#"{"type":"clear"}"#,
        "\n",
        r#"{"type":"laser","x":5,"y":6}"#,
        "\n",
    );
    let script = parse_script(input.as_bytes()).unwrap();
    assert_eq!(script.len(), 3);
    assert!(matches!(script[0], SyncMessage::Drawing(_)));
    assert_eq!(script[1], SyncMessage::Clear);
    assert!(matches!(script[2], SyncMessage::Drawing(_)));
}

#[test]
fn parse_script_reports_line_of_bad_record() {
    let input = "{\"type\":\"clear\"}\n{\"type\":\"spray\",\"x\":1,\"y\":1}\n";
    match parse_script(input.as_bytes()) {
        Err(CliError::Script { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected script error, got {other:?}"),
    }
}

#[test]
fn parse_script_rejects_invalid_json() {
    assert!(matches!(parse_script("not json\n".as_bytes()), Err(CliError::InvalidJson(_))));
}

#[test]
fn outbox_collects_published_frames() {
    let mut channel = Channel::new(Outbox::default()).with_room("lobby");
    channel.connected("me".to_owned());
    channel.publish(&SyncMessage::Clear);
    channel.publish(&SyncMessage::Clear);

    let queued = &channel.transport().frames;
    assert_eq!(queued.len(), 2);
    assert!(queued.iter().all(|f| f.room_id.as_deref() == Some("lobby")));
}

#[test]
fn decode_message_accepts_text_and_binary() {
    let frame = Frame::request(frames::SYSCALL_CLEAR, json!({}));

    let text = Message::Text(serde_json::to_string(&frame).unwrap().into());
    assert_eq!(decode_message(text).unwrap(), Some(frame.clone()));

    let binary = Message::Binary(frames::encode_frame(&frame).into());
    assert_eq!(decode_message(binary).unwrap(), Some(frame));

    assert_eq!(decode_message(Message::Ping(Default::default())).unwrap(), None);
    assert!(matches!(decode_message(Message::Close(None)), Err(CliError::WsClosed)));
}

#[test]
fn cli_parses_subcommands() {
    let cli = Cli::try_parse_from(["sketch", "--room", "art", "watch", "--out", "board.png", "--duration", "5"]).unwrap();
    assert_eq!(cli.room, "art");
    match cli.command {
        Command::Watch(args) => {
            assert_eq!(args.out, PathBuf::from("board.png"));
            assert_eq!((args.width, args.height), (800, 600));
            assert_eq!(args.duration, Some(5));
        }
        other => panic!("expected watch, got {other:?}"),
    }

    let cli = Cli::try_parse_from(["sketch", "--binary", "send"]).unwrap();
    assert!(cli.binary);
    assert!(matches!(cli.command, Command::Send(SendArgs { ref input, delay_ms: 0 }) if input == "-"));
}

#[test]
fn render_replays_script_to_png() {
    let dir = std::env::temp_dir().join(format!("sketch-render-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let script = dir.join("board.jsonl");
    let out = dir.join("board.png");
    std::fs::write(
        &script,
        r##"{"type":"rectangle","x":10,"y":10,"width":20,"height":20,"color":"#ff0000","lineWidth":2}"##,
    )
    .unwrap();

    run_render(RenderArgs { input: script.to_string_lossy().into_owned(), out: out.clone(), width: 64, height: 64 })
        .unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    std::fs::remove_dir_all(&dir).unwrap();
}
