use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use image::{Rgba, RgbaImage};
use tilesurface::{PixelFormat, Point, RasterSurface, Rect, Region};

#[test]
fn readers_on_other_threads_see_whole_edits() {
    let surface = Arc::new(RasterSurface::new(PixelFormat::Rgba8));
    let done = Arc::new(AtomicBool::new(false));
    let started = Arc::new(Barrier::new(2));

    let reader = {
        let surface = Arc::clone(&surface);
        let done = Arc::clone(&done);
        let started = Arc::clone(&started);
        thread::spawn(move || {
            let mut reads = 0usize;
            loop {
                // Each edit fills a whole tile row, so a reader can never see
                // it half applied.
                let view = surface.tiles();
                let populated = view.len();
                assert_eq!(populated % 2, 0, "edit observed half applied");
                drop(view);
                reads += 1;
                if reads == 1 {
                    // The writer only starts once a read has gone through.
                    started.wait();
                }
                if done.load(Ordering::Acquire) {
                    break;
                }
                thread::yield_now();
            }
            reads
        })
    };

    started.wait();
    for row in 0..16 {
        let rect = Rect::new(0, row * 256, 512, 1);
        surface
            .paint_tiles(rect)
            .for_each_painter(|p| p.fill_rect(rect, Rgba([row as u8, 0, 0, 255])));
        thread::yield_now();
    }
    done.store(true, Ordering::Release);
    let reads = reader.join().expect("reader thread panicked");
    assert!(reads > 0);
    assert_eq!(surface.populated_count(), 32);
}

#[test]
fn snapshots_run_while_other_threads_import() {
    let surface = Arc::new(RasterSurface::new(PixelFormat::Rgba8));
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let surface = Arc::clone(&surface);
            thread::spawn(move || {
                let src = RgbaImage::from_pixel(300, 300, Rgba([i as u8 * 60, 0, 0, 255]));
                surface.import_rgba(&src, Point::new(i * 1000, 0));
            })
        })
        .collect();
    for w in writers {
        w.join().expect("writer thread panicked");
    }

    let shot = surface.snapshot(Rect::new(3000, 0, 300, 300));
    assert_eq!(shot.get_pixel(299, 299), &Rgba([180, 0, 0, 255]));
    let entity = surface.render_entity();
    let mut dest = RgbaImage::new(10, 10);
    entity
        .draw(&mut dest, Point::new(1000, 0), &Region::from(Rect::new(1000, 0, 10, 10)))
        .expect("surface is alive");
    assert_eq!(dest.get_pixel(9, 9), &Rgba([60, 0, 0, 255]));
}
