use super::*;

fn drain_all(order: &[u64]) -> Vec<u64> {
    let mut buf = ReorderBuffer::new();
    let mut out = Vec::new();
    for &seq in order {
        out.extend(buf.push(seq, seq).unwrap());
    }
    assert_eq!(buf.pending_len(), 0);
    out
}

#[test]
fn in_order_arrivals_pass_straight_through() {
    let mut buf = ReorderBuffer::new();
    assert_eq!(buf.push(0, 'a').unwrap(), vec!['a']);
    assert_eq!(buf.push(1, 'b').unwrap(), vec!['b']);
    assert_eq!(buf.next_seq(), 2);
}

#[test]
fn late_head_releases_parked_run() {
    let mut buf = ReorderBuffer::new();
    assert!(buf.push(2, 2).unwrap().is_empty());
    assert!(buf.push(1, 1).unwrap().is_empty());
    assert_eq!(buf.pending_len(), 2);
    assert_eq!(buf.push(0, 0).unwrap(), vec![0, 1, 2]);
}

#[test]
fn every_arrival_permutation_of_five_yields_sequence_order() {
    fn permute(items: &mut Vec<u64>, k: usize, out: &mut Vec<Vec<u64>>) {
        if k == items.len() {
            out.push(items.clone());
            return;
        }
        for i in k..items.len() {
            items.swap(k, i);
            permute(items, k + 1, out);
            items.swap(k, i);
        }
    }

    let mut perms = Vec::new();
    permute(&mut vec![0, 1, 2, 3, 4], 0, &mut perms);
    assert_eq!(perms.len(), 120);
    for order in perms {
        assert_eq!(drain_all(&order), vec![0, 1, 2, 3, 4], "order {order:?}");
    }
}

#[test]
fn duplicates_and_stale_sequences_are_rejected() {
    let mut buf = ReorderBuffer::new();
    buf.push(0, "a").unwrap();
    assert_eq!(buf.push(0, "again"), Err("again"));
    buf.push(3, "d").unwrap();
    assert_eq!(buf.push(3, "dup"), Err("dup"));
    assert_eq!(buf.clear(), 1);
}
