use burn::tensor::{backend::Backend, Bool, Data, Int, Shape, Tensor};

/// Pad every sequence with `pad_token` up to `seq_length`, producing a `[batch_size, seq_length]`
/// index tensor. Sequences longer than `seq_length` are truncated.
pub fn pad_to<B: Backend>(
    pad_token: usize,
    tokens_list: &[Vec<usize>],
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = tokens_list.len();
    let mut values = vec![pad_token as i64; batch_size * seq_length];

    for (index, tokens) in tokens_list.iter().enumerate() {
        let row = &mut values[index * seq_length..(index + 1) * seq_length];

        for (slot, token) in row.iter_mut().zip(tokens) {
            *slot = *token as i64;
        }
    }

    let data = Data::new(values, Shape::new([batch_size, seq_length]));

    Tensor::from_data(data.convert::<B::IntElem>(), device)
}

/// Build a `[batch_size, seq_length]` mask that is `true` at padding positions, i.e. at every
/// position at or beyond the true length of the row
pub fn padding_mask<B: Backend>(
    lengths: &[usize],
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Bool> {
    let values = lengths
        .iter()
        .flat_map(|length| (0..seq_length).map(move |position| position >= *length))
        .collect();

    Tensor::from_data(
        Data::new(values, Shape::new([lengths.len(), seq_length])),
        device,
    )
}

/// Build a float matrix from row-major values
pub fn matrix<B: Backend>(values: Vec<f32>, rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    let data = Data::new(values, Shape::new([rows, cols]));

    Tensor::from_data(data.convert::<B::FloatElem>(), device)
}

/// Build a float vector
pub fn vector<B: Backend>(values: Vec<f32>, device: &B::Device) -> Tensor<B, 1> {
    let length = values.len();
    let data = Data::new(values, Shape::new([length]));

    Tensor::from_data(data.convert::<B::FloatElem>(), device)
}

/// Copy the contents of a float tensor back to the host
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().value
}
