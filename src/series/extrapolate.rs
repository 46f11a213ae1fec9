// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::{decode::Scalar, time_series::Datapoint};
use crate::time::TimeRange;

const MIN_DATAPOINTS: usize = 10;

/// Corrects boundary samples that sit closer to the range edge than the
/// average sample spacing. Running-difference queries leave the first bucket
/// at zero and the last bucket partial.
pub(crate) fn extrapolate(datapoints: &mut [Datapoint], range: &TimeRange) {
    let len = datapoints.len();
    if len < MIN_DATAPOINTS {
        return;
    }
    let Some(values) = datapoints
        .iter()
        .map(|point| point.0.as_number())
        .collect::<Option<Vec<f64>>>()
    else {
        return;
    };

    let first = values[0];
    if !range.is_open_ended && first == 0.0 {
        return;
    }

    let first_seconds = datapoints[0].1 as f64 / 1000.0;
    let last_seconds = datapoints[len - 1].1 as f64 / 1000.0;
    let duration_to_start = first_seconds - range.from_seconds as f64;
    let duration_to_end = range.to_seconds as f64 - last_seconds;
    let average_spacing = (last_seconds - first_seconds) / (len - 1) as f64;

    if duration_to_start < average_spacing && first == 0.0 {
        datapoints[0].0 = Scalar::Number(values[1] * (1.0 + diff_ratio(values[1], values[2])));
    }
    if duration_to_end < average_spacing {
        let (second_last, third_last) = (values[len - 2], values[len - 3]);
        datapoints[len - 1].0 =
            Scalar::Number(second_last * (1.0 + diff_ratio(second_last, third_last)));
    }
}

fn diff_ratio(reference: f64, neighbour: f64) -> f64 {
    let ratio = ((reference - neighbour) / reference * 0.1) % 1.0;
    if ratio.is_finite() { ratio } else { 0.0 }
}
