#[cfg(test)]
mod tests {
    use crossbeam_utils::thread;
    use rand::prelude::*;
    use ringq::{MpscRingBuffer, RingBuffer};
    use std::thread::spawn;
    use std::time::{Duration, Instant};

    cfg_if::cfg_if! {
        if #[cfg(feature = "chaos")] {
            // Every atomic op sleeps, keep the run short
            const ITERS: usize = 2_000;
        } else {
            const ITERS: usize = 1_000_000;
        }
    }

    #[cfg(feature = "verbose")]
    const RPT_IVAL: usize = ITERS / 10;

    const TIMEOUT_NODATA: Duration = Duration::from_millis(10_000);

    /// Every lane carries the same sequence number. A slot that is read
    /// before its write has landed shows up either as the wrong sequence
    /// number or as lanes that disagree.
    type Stamped = [u64; 4];

    fn stamped(seq: u64) -> Stamped {
        [seq; 4]
    }

    #[test]
    fn sanity_check() {
        // A tiny buffer, so the cursors wrap constantly and the producer
        // is almost always writing the slot right behind the consumer
        let rb: &'static RingBuffer<Stamped> = Box::leak(Box::new(RingBuffer::new(3)));
        let (mut tx, mut rx) = rb.try_split().unwrap();

        let start = Instant::now();

        let tx_thr = spawn(move || {
            let mut last_tx = start;
            for i in 0..ITERS {
                while !tx.push(stamped(i as u64 + 1)) {
                    if last_tx.elapsed() > TIMEOUT_NODATA {
                        panic!("tx timeout, iter {}", i);
                    }
                }
                last_tx = Instant::now();

                #[cfg(feature = "verbose")]
                if i % RPT_IVAL == 0 {
                    println!("tx: {}", i);
                }
            }
        });

        let rx_thr = spawn(move || {
            let mut last_rx = start;
            for i in 0..ITERS {
                let got = loop {
                    if last_rx.elapsed() > TIMEOUT_NODATA {
                        panic!("rx timeout, iter {}", i);
                    }
                    if let Some(v) = rx.try_pop() {
                        break v;
                    }
                };
                last_rx = Instant::now();

                assert_eq!(got, stamped(i as u64 + 1), "RX Iter: {}", i);

                #[cfg(feature = "verbose")]
                if i % RPT_IVAL == 0 {
                    println!("rx: {}", i);
                }
            }
            assert_eq!(rx.available(), 0);
        });

        tx_thr.join().unwrap();
        rx_thr.join().unwrap();
    }

    #[test]
    fn randomize_tx() {
        const QUEUE_SIZE: usize = 1024;

        let mut data = Vec::with_capacity(ITERS);
        (0..ITERS).for_each(|_| data.push(rand::random::<u8>()));

        let rb: RingBuffer<u8> = RingBuffer::new(QUEUE_SIZE);
        let (mut tx, mut rx) = rb.try_split().unwrap();

        thread::scope(|sc| {
            let data = &data;

            sc.spawn(move |_| {
                let mut trng = thread_rng();
                let mut last_tx = Instant::now();
                let mut sent = 0;

                while sent < data.len() {
                    if last_tx.elapsed() > TIMEOUT_NODATA {
                        panic!("tx timeout, sent {}", sent);
                    }

                    let chunk_sz = trng.gen_range(1..(QUEUE_SIZE / 2));
                    let end = (sent + chunk_sz).min(data.len());
                    let pushed = tx.push_n(&data[sent..end]);
                    if pushed > 0 {
                        sent += pushed;
                        last_tx = Instant::now();
                    }
                }
            });

            sc.spawn(move |_| {
                let mut trng = thread_rng();
                let mut last_rx = Instant::now();
                let mut rxd = 0;
                let mut buf = [0u8; QUEUE_SIZE];

                while rxd < data.len() {
                    if last_rx.elapsed() > TIMEOUT_NODATA {
                        panic!("rx timeout, received {}", rxd);
                    }

                    let want = trng.gen_range(1..QUEUE_SIZE);
                    let got = rx.pop_n(&mut buf[..want]);
                    if got > 0 {
                        assert_eq!(&buf[..got], &data[rxd..rxd + got], "RX at {}", rxd);
                        rxd += got;
                        last_rx = Instant::now();
                    }
                }
            });
        })
        .unwrap();
    }

    #[test]
    fn mpsc_racing_producers() {
        const PRODUCERS: u64 = 4;
        let per_producer = (ITERS / PRODUCERS as usize) as u64;

        let rb: MpscRingBuffer<Stamped> = MpscRingBuffer::new(7);
        let (prod, mut cons) = rb.try_split().unwrap();

        thread::scope(|sc| {
            for p in 0..PRODUCERS {
                let prod = prod.clone();
                sc.spawn(move |_| {
                    let mut last_tx = Instant::now();
                    for i in 0..per_producer {
                        // Producer id in the top bits, sequence number below
                        let val = stamped((p << 48) | (i + 1));
                        while !prod.push(val) {
                            if last_tx.elapsed() > TIMEOUT_NODATA {
                                panic!("tx {} timeout, iter {}", p, i);
                            }
                        }
                        last_tx = Instant::now();
                    }
                });
            }

            sc.spawn(|_| {
                let mut next = [1u64; PRODUCERS as usize];
                let mut buf = [Stamped::default(); 5];
                let mut rxd = 0;
                let mut last_rx = Instant::now();

                while rxd < per_producer * PRODUCERS {
                    if last_rx.elapsed() > TIMEOUT_NODATA {
                        panic!("rx timeout, received {}", rxd);
                    }

                    let got = cons.pop_n(&mut buf);
                    for v in &buf[..got] {
                        assert!(v.iter().all(|lane| *lane == v[0]), "torn: {:?}", v);
                        let (p, seq) = ((v[0] >> 48) as usize, v[0] & 0xFFFF_FFFF_FFFF);

                        // Each producer's own pushes stay in order, with no gaps
                        // and no repeats
                        assert_eq!(seq, next[p], "producer {}", p);
                        next[p] += 1;
                    }
                    if got > 0 {
                        rxd += got as u64;
                        last_rx = Instant::now();
                    }
                }

                assert!(next.iter().all(|n| *n == per_producer + 1));
            });
        })
        .unwrap();

        assert_eq!(cons.available(), 0);
        assert_eq!(rb.available_for_write(), 7);
    }

    #[test]
    fn mpsc_fill_until_full() {
        const PRODUCERS: u32 = 8;
        const CAPACITY: usize = 1000;

        for _ in 0..20 {
            let rb: MpscRingBuffer<u32> = MpscRingBuffer::new(CAPACITY);
            let (prod, mut cons) = rb.try_split().unwrap();

            let mut accepted: Vec<u32> = thread::scope(|sc| {
                let handles: Vec<_> = (0..PRODUCERS)
                    .map(|p| {
                        let prod = prod.clone();
                        sc.spawn(move |_| {
                            let mut mine = Vec::new();
                            let mut i = 1;
                            while prod.push((p << 24) | i) {
                                mine.push((p << 24) | i);
                                i += 1;
                            }
                            mine
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .flat_map(|h| h.join().unwrap())
                    .collect()
            })
            .unwrap();

            assert_eq!(accepted.len(), CAPACITY);
            assert_eq!(prod.available_for_write(), 0);
            assert_eq!(cons.available(), CAPACITY);

            let mut seen = vec![0u32; CAPACITY + 1];
            assert_eq!(cons.pop_n(&mut seen), CAPACITY);

            // Per producer order survives the race
            let mut next = [1u32; PRODUCERS as usize];
            for v in &seen[..CAPACITY] {
                let p = (v >> 24) as usize;
                assert_eq!(v & 0xFF_FFFF, next[p]);
                next[p] += 1;
            }

            // Nothing lost, nothing duplicated
            seen.truncate(CAPACITY);
            seen.sort_unstable();
            accepted.sort_unstable();
            assert_eq!(seen, accepted);
        }
    }

    #[test]
    fn mpsc_push_n_keeps_producer_order() {
        const PRODUCERS: u32 = 3;
        const BLOCK: usize = 4;
        let blocks = (ITERS / 10) as u32;

        let rb: MpscRingBuffer<u32> = MpscRingBuffer::new(64);
        let (prod, mut cons) = rb.try_split().unwrap();

        thread::scope(|sc| {
            for p in 1..=PRODUCERS {
                let prod = prod.clone();
                sc.spawn(move |_| {
                    for b in 0..blocks {
                        let block = [(p << 28) | b; BLOCK];
                        let mut sent = 0;
                        while sent < BLOCK {
                            sent += prod.push_n(&block[sent..]);
                        }
                    }
                });
            }

            sc.spawn(|_| {
                let total = blocks as usize * BLOCK * PRODUCERS as usize;
                let mut rxd = 0;
                // Last block seen per producer, and how many of its elements
                let mut last: [Option<(u32, usize)>; PRODUCERS as usize + 1] =
                    [None; PRODUCERS as usize + 1];
                while rxd < total {
                    let v = match cons.try_pop() {
                        Some(v) => v,
                        None => continue,
                    };
                    let p = (v >> 28) as usize;
                    let b = v & 0x0FFF_FFFF;
                    last[p] = match last[p] {
                        Some((prev, n)) if prev == b => {
                            assert!(n < BLOCK, "block {} of producer {} too long", b, p);
                            Some((b, n + 1))
                        }
                        Some((prev, n)) => {
                            assert_eq!(n, BLOCK, "block {} of producer {} cut short", prev, p);
                            assert_eq!(b, prev + 1, "producer {}", p);
                            Some((b, 1))
                        }
                        None => {
                            assert_eq!(b, 0);
                            Some((b, 1))
                        }
                    };
                    rxd += 1;
                }
            });
        })
        .unwrap();
    }
}
