//! End-to-end replay of the drawing pipeline.
//!
//! Encoder → renderer → channel → hub → channel → renderer, checked by
//! comparing pixels between participants.
#![allow(clippy::float_cmp)]

use canvas::channel::{Channel, Delivery};
use canvas::encoder::{Emission, Encoder};
use canvas::engine::{Action, EngineCore};
use canvas::hub::{Hub, HubTransport};
use canvas::input::{Point, Session, Style, Tool};
use canvas::op::{BoxShape, DrawingOperation, Message, Segment, TextRun};
use canvas::render::{Renderer, arrow_wings};
use canvas::surface::Raster;
use frames::{decode_frame, encode_frame};

const SIZE: u32 = 240;

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn blank() -> Raster {
    Raster::new(SIZE, SIZE).expect("raster")
}

fn render_all(ops: &[DrawingOperation]) -> Raster {
    let mut raster = blank();
    let mut renderer = Renderer::new();
    for op in ops {
        renderer.apply(&mut raster, op);
    }
    raster
}

fn boxed(x: f64, y: f64, width: f64, height: f64) -> BoxShape {
    BoxShape { x, y, width, height, color: "#336699".to_owned(), line_width: 3.0 }
}

fn sample_ops() -> Vec<DrawingOperation> {
    vec![
        DrawingOperation::Line(Segment {
            start_x: 10.0,
            start_y: 10.0,
            end_x: 200.0,
            end_y: 40.0,
            color: "red".to_owned(),
            line_width: 4.0,
        }),
        DrawingOperation::Arrow(Segment {
            start_x: 20.0,
            start_y: 200.0,
            end_x: 180.0,
            end_y: 120.0,
            color: "#00f".to_owned(),
            line_width: 2.0,
        }),
        DrawingOperation::Rectangle(boxed(150.0, 150.0, -80.0, -40.0)),
        DrawingOperation::Ellipse(boxed(30.0, 60.0, 90.0, 50.0)),
        DrawingOperation::Triangle(boxed(120.0, 60.0, 60.0, 60.0)),
        DrawingOperation::Star(boxed(60.0, 120.0, 80.0, 80.0)),
        DrawingOperation::Text(TextRun { x: 20.0, y: 230.0, text: "Hello".to_owned(), color: "rgb(0,128,0)".to_owned() }),
    ]
}

// =============================================================
// Participants over a hub
// =============================================================

struct Peer {
    engine: EngineCore,
    channel: Channel<HubTransport>,
}

impl Peer {
    fn join(hub: &Hub) -> Self {
        let mut peer = Self {
            engine: EngineCore::new(SIZE, SIZE).expect("engine"),
            channel: Channel::new(hub.join()).with_room("test"),
        };
        peer.sync();
        assert!(peer.channel.is_connected());
        peer
    }

    fn run(&mut self, actions: Vec<Action>) -> Vec<Delivery> {
        actions
            .into_iter()
            .filter_map(|a| match a {
                Action::Publish(msg) => Some(self.channel.publish(&msg)),
                _ => None,
            })
            .collect()
    }

    fn sync(&mut self) {
        for frame in self.channel.transport().drain() {
            if let Some(msg) = self.channel.receive(&frame) {
                self.engine.apply_remote(&msg);
            }
        }
    }

    fn drag(&mut self, tool: Tool, from: Point, to: Point) -> Vec<Delivery> {
        self.engine.set_tool(tool);
        let mid = pt((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
        let mut actions = self.engine.on_pointer_down(from);
        actions.extend(self.engine.on_pointer_move(mid));
        actions.extend(self.engine.on_pointer_move(to));
        actions.extend(self.engine.on_pointer_up(to));
        self.run(actions)
    }
}

#[test]
fn peers_converge_on_the_same_pixels() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let mut b = Peer::join(&hub);

    a.drag(Tool::Pen, pt(10.0, 10.0), pt(120.0, 90.0));
    a.drag(Tool::Rectangle, pt(50.0, 50.0), pt(150.0, 120.0));
    a.engine.set_color("#ff8800");
    a.drag(Tool::Star, pt(100.0, 100.0), pt(200.0, 200.0));
    a.drag(Tool::Eraser, pt(60.0, 50.0), pt(100.0, 50.0));
    b.sync();

    assert!(!a.engine.canvas().is_blank());
    assert!(a.engine.canvas().same_pixels(b.engine.canvas()));
}

#[test]
fn previews_are_never_broadcast() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let b = Peer::join(&hub);

    let sent = a.drag(Tool::Ellipse, pt(20.0, 20.0), pt(120.0, 80.0));
    assert_eq!(sent, vec![Delivery::Sent]);
    assert_eq!(b.channel.transport().drain().len(), 1);
}

#[test]
fn fifo_per_sender_keeps_clear_in_place() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let mut b = Peer::join(&hub);

    a.drag(Tool::Line, pt(0.0, 0.0), pt(200.0, 200.0));
    let wipe = a.engine.clear();
    a.run(wipe);
    a.drag(Tool::Triangle, pt(40.0, 40.0), pt(140.0, 140.0));
    b.sync();

    assert!(a.engine.canvas().same_pixels(b.engine.canvas()));
    // The diagonal line came before the clear, so nothing of it survives.
    assert_eq!(b.engine.canvas().pixel(10, 10).map(|p| p.a), Some(0));
}

#[test]
fn clear_from_peer_wipes_mid_gesture() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let mut b = Peer::join(&hub);

    b.drag(Tool::Rectangle, pt(10.0, 10.0), pt(100.0, 100.0));
    b.engine.set_tool(Tool::Pen);
    let down = b.engine.on_pointer_down(pt(5.0, 5.0));
    b.run(down);
    a.sync();
    let wipe = a.engine.clear();
    a.run(wipe);
    b.sync();

    assert!(b.engine.canvas().is_blank());
}

#[test]
fn publish_while_disconnected_is_lost() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let mut b = Peer::join(&hub);
    let a_id = a.channel.transport().client_id();

    hub.set_online(a_id, false);
    let sent = a.drag(Tool::Rectangle, pt(10.0, 10.0), pt(60.0, 60.0));
    assert_eq!(sent, vec![Delivery::Dropped]);
    assert!(!a.channel.is_connected());

    hub.set_online(a_id, true);
    a.sync();
    assert!(a.channel.is_connected());
    let sent = a.drag(Tool::Line, pt(100.0, 100.0), pt(200.0, 100.0));
    assert_eq!(sent, vec![Delivery::Sent]);

    b.sync();
    assert_eq!(b.engine.canvas().pixel(10, 30).map(|p| p.a), Some(0), "dropped shape never arrives");
    assert_eq!(b.engine.canvas().pixel(150, 100).map(|p| p.a), Some(255));
    assert!(!a.engine.canvas().same_pixels(b.engine.canvas()));
}

#[test]
fn laser_reaches_peers_without_marking_canvas() {
    let hub = Hub::new();
    let mut a = Peer::join(&hub);
    let mut b = Peer::join(&hub);

    a.engine.set_tool(Tool::Laser);
    let ping = a.engine.on_pointer_down(pt(120.0, 120.0));
    a.run(ping);
    b.sync();

    assert_eq!(b.engine.live_lasers(), 1);
    assert!(b.engine.canvas().is_blank());
    assert!(!b.engine.compose().is_blank());
}

// =============================================================
// Worked scenarios
// =============================================================

#[test]
fn pen_start_then_draw() {
    let mut enc = Encoder::new();
    let session = Session::default();

    let Some(Emission::Commit(start)) = enc.pointer_down(&session, pt(10.0, 10.0)) else {
        panic!("pen down must commit");
    };
    let rec = start.to_record().expect("record");
    assert_eq!(rec["type"], "start");
    assert_eq!(rec["tool"], 1);
    assert_eq!(rec["x"].as_f64(), Some(10.0));
    assert_eq!(rec["y"].as_f64(), Some(10.0));
    assert_eq!(rec["color"], "#000000");
    assert_eq!(rec["lineWidth"].as_f64(), Some(2.0));

    let Some(Emission::Commit(draw)) = enc.pointer_move(&session, pt(20.0, 15.0)) else {
        panic!("pen move must commit");
    };
    let rec = draw.to_record().expect("record");
    assert_eq!(rec["type"], "draw");
    assert_eq!(rec["x"].as_f64(), Some(20.0));
    assert_eq!(rec["y"].as_f64(), Some(15.0));
    assert_eq!(enc.pointer_up(&session, pt(20.0, 15.0)), None);

    let raster = render_all(&[start, draw]);
    assert!(raster.pixel(15, 12).is_some_and(|p| p.a > 0));
    assert_eq!(raster.pixel(15, 30).map(|p| p.a), Some(0));
}

#[test]
fn rectangle_drag_emits_exactly_one_record() {
    let mut enc = Encoder::new();
    let session = Session::new(Tool::Rectangle, Style::default());

    let mut emissions = vec![enc.pointer_down(&session, pt(50.0, 50.0))];
    for step in 1..10 {
        let t = f64::from(step) / 10.0;
        emissions.push(enc.pointer_move(&session, pt(50.0 + 100.0 * t, 50.0 + 70.0 * t)));
    }
    emissions.push(enc.pointer_up(&session, pt(150.0, 120.0)));

    let commits: Vec<_> = emissions
        .into_iter()
        .flatten()
        .filter_map(|e| match e {
            Emission::Commit(op) => Some(op),
            _ => None,
        })
        .collect();
    assert_eq!(commits.len(), 1);
    let rec = commits[0].to_record().expect("record");
    assert_eq!(rec["type"], "rectangle");
    assert_eq!(rec["x"].as_f64(), Some(50.0));
    assert_eq!(rec["y"].as_f64(), Some(50.0));
    assert_eq!(rec["width"].as_f64(), Some(100.0));
    assert_eq!(rec["height"].as_f64(), Some(70.0));
}

#[test]
fn zero_length_line_draws_a_point() {
    let mut enc = Encoder::new();
    let style = Style::new("#000000", 6.0).expect("style");
    let session = Session::new(Tool::Line, style);

    assert_eq!(enc.pointer_down(&session, pt(100.0, 100.0)), None);
    let Some(Emission::Commit(op)) = enc.pointer_up(&session, pt(100.0, 100.0)) else {
        panic!("line up must commit");
    };
    let rec = op.to_record().expect("record");
    assert_eq!(rec["type"], "line");
    for key in ["startX", "startY", "endX", "endY"] {
        assert_eq!(rec[key].as_f64(), Some(100.0), "{key}");
    }

    let raster = render_all(&[op]);
    assert_eq!(raster.pixel(100, 100).map(|p| p.a), Some(255));
    assert_eq!(raster.pixel(110, 100).map(|p| p.a), Some(0));
}

#[test]
fn arrowhead_wings_on_horizontal_shaft() {
    let shaft = Segment {
        start_x: 0.0,
        start_y: 0.0,
        end_x: 100.0,
        end_y: 0.0,
        color: "#000000".to_owned(),
        line_width: 2.0,
    };
    let [left, right] = arrow_wings(&shaft);
    for wing in [left, right] {
        let len = (100.0 - wing.x).hypot(wing.y);
        assert!((len - 20.0).abs() < 1e-9);
        assert!((wing.x - (100.0 - 20.0 * (std::f64::consts::PI / 6.0).cos())).abs() < 1e-9);
    }
    assert!((left.y - 10.0).abs() < 1e-9);
    assert!((right.y + 10.0).abs() < 1e-9);
}

// =============================================================
// Properties
// =============================================================

#[test]
fn replay_is_deterministic() {
    let ops = sample_ops();
    assert!(render_all(&ops).same_pixels(&render_all(&ops)));
}

#[test]
fn each_non_destructive_op_is_idempotent_across_surfaces() {
    for op in sample_ops() {
        let once = render_all(std::slice::from_ref(&op));
        let again = render_all(std::slice::from_ref(&op));
        assert!(!once.is_blank(), "{} drew nothing", op.kind());
        assert!(once.same_pixels(&again), "{}", op.kind());
    }
}

#[test]
fn wire_round_trip_renders_identically() {
    let ops = sample_ops();
    let decoded: Vec<DrawingOperation> = ops
        .iter()
        .map(|op| {
            let frame = Message::Drawing(op.clone()).to_frame().expect("frame");
            let back = decode_frame(&encode_frame(&frame)).expect("decode");
            match Message::from_frame(&back).expect("message") {
                Message::Drawing(op) => op,
                Message::Clear => panic!("drawing decoded as clear"),
            }
        })
        .collect();
    assert!(render_all(&ops).same_pixels(&render_all(&decoded)));
}

#[test]
fn zero_area_shapes_do_not_fail() {
    let ops = [
        DrawingOperation::Rectangle(boxed(50.0, 50.0, 0.0, 40.0)),
        DrawingOperation::Ellipse(boxed(50.0, 50.0, 40.0, 0.0)),
        DrawingOperation::Triangle(boxed(50.0, 50.0, 0.0, 0.0)),
        DrawingOperation::Star(boxed(50.0, 50.0, 0.0, 30.0)),
    ];
    let _raster = render_all(&ops);
}
