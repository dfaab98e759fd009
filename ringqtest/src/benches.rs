use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam_utils::thread;
use ringq::{MpscRingBuffer, RingBuffer};

const DATA_SZ: usize = 4 * 1024 * 1024;

pub fn criterion_benchmark(c: &mut Criterion) {
    let data = (0..DATA_SZ).map(|i| i as u8).collect::<Vec<u8>>();

    c.bench_function("ringq push/pop 1/4096", |bench| bench.iter(|| single(&data)));

    c.bench_function("ringq 128/4096", |bench| bench.iter(|| chunky(&data, 128)));

    c.bench_function("ringq 512/4096", |bench| bench.iter(|| chunky(&data, 512)));

    c.bench_function("ringq 2048/4096", |bench| bench.iter(|| chunky(&data, 2048)));

    c.bench_function("ringq mpsc 4x 128/4096", |bench| {
        bench.iter(|| mpsc_chunky(&data, 128, 4))
    });

    c.bench_function("std channels 128 unbounded", |bench| {
        bench.iter(|| {
            use std::sync::mpsc::{Receiver, Sender};
            let (prod, cons): (Sender<[u8; 128]>, Receiver<[u8; 128]>) =
                std::sync::mpsc::channel();
            let rdata = &data;

            thread::scope(|sc| {
                sc.spawn(move |_| {
                    rdata.chunks(128).for_each(|ch| {
                        let mut x = [0u8; 128];
                        x.copy_from_slice(ch);
                        prod.send(x).unwrap();
                    });
                });

                sc.spawn(move |_| {
                    rdata.chunks(128).for_each(|ch| {
                        let x = cons.recv().unwrap();
                        assert_eq!(&x[..], ch);
                    });
                });
            })
            .unwrap();
        })
    });

    c.bench_function("xbeam channels 128/4096", |bench| {
        bench.iter(|| {
            use crossbeam::channel::{bounded, Receiver, Sender};
            let (prod, cons): (Sender<[u8; 128]>, Receiver<[u8; 128]>) = bounded(4096 / 128);
            let rdata = &data;

            thread::scope(|sc| {
                sc.spawn(move |_| {
                    rdata.chunks(128).for_each(|ch| {
                        let mut x = [0u8; 128];
                        x.copy_from_slice(ch);
                        prod.send(x).unwrap();
                    });
                });

                sc.spawn(move |_| {
                    rdata.chunks(128).for_each(|ch| {
                        let x = cons.recv().unwrap();
                        assert_eq!(&x[..], ch);
                    });
                });
            })
            .unwrap();
        })
    });

    use heapless::spsc::Queue;

    let mut queue: Queue<u8, 4096> = Queue::new();
    let (mut prod, mut cons) = queue.split();

    c.bench_function("heapless spsc::Queue 1/4096", |bench| {
        bench.iter(|| {
            black_box(thread::scope(|sc| {
                sc.spawn(|_| {
                    data.iter().for_each(|by| while prod.enqueue(*by).is_err() {});
                });

                sc.spawn(|_| {
                    data.iter().for_each(|by| loop {
                        if let Some(x) = cons.dequeue() {
                            assert_eq!(x, *by);
                            break;
                        }
                    });
                });
            }))
            .unwrap();
        })
    });
}

fn single(data: &[u8]) {
    let buffy: RingBuffer<u8> = RingBuffer::new(4096);
    let (mut prod, mut cons) = buffy.try_split().unwrap();

    thread::scope(|sc| {
        sc.spawn(|_| {
            data.iter().for_each(|by| while !prod.push(*by) {});
        });

        sc.spawn(|_| {
            data.iter().for_each(|by| loop {
                if let Some(x) = cons.try_pop() {
                    assert_eq!(x, *by);
                    break;
                }
            });
        });
    })
    .unwrap();
}

fn chunky(data: &[u8], chunksz: usize) {
    let buffy: RingBuffer<u8> = RingBuffer::new(4096);
    let (mut prod, mut cons) = buffy.try_split().unwrap();

    thread::scope(|sc| {
        sc.spawn(|_| {
            data.chunks(chunksz).for_each(|ch| {
                let mut st = 0;
                while st < ch.len() {
                    st += prod.push_n(&ch[st..]);
                }
            });
        });

        sc.spawn(|_| {
            let mut buf = vec![0u8; chunksz];
            data.chunks(chunksz).for_each(|ch| {
                let mut st = 0;
                while st < ch.len() {
                    let len = cons.pop_n(&mut buf[..ch.len() - st]);
                    assert_eq!(ch[st..st + len], buf[..len]);
                    st += len;
                }
            });
        });
    })
    .unwrap();
}

fn mpsc_chunky(data: &[u8], chunksz: usize, producers: usize) {
    let buffy: MpscRingBuffer<u8> = MpscRingBuffer::new(4096);
    let (prod, mut cons) = buffy.try_split().unwrap();
    let share = data.len() / producers;

    thread::scope(|sc| {
        for part in data.chunks(share) {
            let prod = prod.clone();
            sc.spawn(move |_| {
                part.chunks(chunksz).for_each(|ch| {
                    let mut st = 0;
                    while st < ch.len() {
                        st += prod.push_n(&ch[st..]);
                    }
                });
            });
        }

        sc.spawn(|_| {
            let mut buf = vec![0u8; chunksz];
            let mut rxd = 0;
            while rxd < data.len() {
                rxd += black_box(cons.pop_n(&mut buf));
            }
        });
    })
    .unwrap();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
