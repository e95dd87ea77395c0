use battleship_server::{BitBoard, BitBoardError};

#[test]
fn test_try_new_sizes() {
    let ok = BitBoard::<u128, 10>::try_new();
    assert!(ok.is_ok());

    let err = BitBoard::<u8, 3>::try_new();
    assert!(matches!(err, Err(BitBoardError::SizeTooLarge { .. })));
}

#[test]
fn test_get_set_and_bounds() {
    let mut bb = BitBoard::<u16, 4>::new();
    assert!(bb.is_empty());

    bb.set(1, 1).unwrap();
    assert!(bb.get(1, 1).unwrap());
    assert!(!bb.get(2, 3).unwrap());
    assert_eq!(bb.count_ones(), 1);

    assert_eq!(
        bb.set(4, 0).unwrap_err(),
        BitBoardError::IndexOutOfBounds { row: 4, col: 0 }
    );
    assert!(!bb.contains(4, 0));

    bb.clear_all();
    assert!(bb.is_empty());
}

#[test]
fn test_from_cells_and_iter() {
    let bb = BitBoard::<u16, 4>::from_cells([(0, 1), (3, 3)]).unwrap();
    let bits: Vec<_> = bb.iter_set_bits().collect();
    assert_eq!(bits, vec![(0, 1), (3, 3)]);
}

#[test]
fn test_halo_in_corner_is_clipped() {
    let bb = BitBoard::<u16, 4>::from_cells([(0, 0)]).unwrap();
    let halo: Vec<_> = bb.halo().iter_set_bits().collect();
    assert_eq!(halo, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
}

#[test]
fn test_halo_covers_diagonals() {
    let bb = BitBoard::<u128, 10>::from_cells([(5, 5)]).unwrap();
    let halo = bb.halo();
    assert_eq!(halo.count_ones(), 9);
    for (r, c) in [(4, 4), (4, 6), (6, 4), (6, 6)] {
        assert!(halo.contains(r, c));
    }
    assert!(!halo.contains(7, 5));
}

#[test]
fn test_bit_ops() {
    let a = BitBoard::<u128, 10>::from_cells([(0, 0), (1, 1)]).unwrap();
    let b = BitBoard::<u128, 10>::from_cells([(1, 1), (2, 2)]).unwrap();
    assert_eq!((a & b).iter_set_bits().collect::<Vec<_>>(), vec![(1, 1)]);
    let mut union = a;
    union |= b;
    assert_eq!(union.count_ones(), 3);
}
