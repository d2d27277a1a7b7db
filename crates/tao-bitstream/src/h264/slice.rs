//! H.264 切片头解析 (POC 推导所需部分) 与图像顺序计数 (8.2.1).

use tao_core::bitreader::BitReader;
use tao_core::{TaoError, TaoResult};

use super::pps::Pps;
use super::sps::Sps;

/// 切片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceType {
    /// P 切片
    #[default]
    P,
    /// B 切片
    B,
    /// I 切片
    I,
    /// SP 切片
    Sp,
    /// SI 切片
    Si,
}

impl SliceType {
    /// 从 slice_type 语法值 (0-9) 转换
    pub fn from_raw(value: u32) -> TaoResult<Self> {
        match value % 5 {
            0 if value <= 9 => Ok(Self::P),
            1 if value <= 9 => Ok(Self::B),
            2 if value <= 9 => Ok(Self::I),
            3 if value <= 9 => Ok(Self::Sp),
            4 if value <= 9 => Ok(Self::Si),
            _ => Err(TaoError::InvalidData(format!(
                "H.264: slice_type 非法, value={}",
                value
            ))),
        }
    }
}

/// 切片头 (解析到 redundant_pic_cnt 为止)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceHeader {
    /// first_mb_in_slice
    pub first_mb_in_slice: u32,
    /// slice_type
    pub slice_type: SliceType,
    /// pic_parameter_set_id
    pub pps_id: u32,
    /// frame_num
    pub frame_num: u32,
    /// field_pic_flag
    pub field_pic_flag: bool,
    /// bottom_field_flag
    pub bottom_field_flag: bool,
    /// idr_pic_id
    pub idr_pic_id: u32,
    /// pic_order_cnt_lsb
    pub poc_lsb: u32,
    /// delta_pic_order_cnt_bottom
    pub delta_poc_bottom: i32,
    /// delta_pic_order_cnt[0..2]
    pub delta_poc: [i32; 2],
    /// redundant_pic_cnt
    pub redundant_pic_cnt: u32,
}

/// 最近一个切片的上下文信息 (对外报告)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceInfo {
    /// 图像顺序计数
    pub poc: i32,
    /// 引用的 PPS
    pub pps_id: u32,
    /// field_pic_flag
    pub field_pic_flag: bool,
    /// slice_type
    pub slice_type: SliceType,
    /// frame_num
    pub frame_num: u32,
    /// 是否为 IDR
    pub idr: bool,
}

/// 解析切片头
///
/// `rbsp` 为 NAL 头部之后的 RBSP 数据. `pps_id` 需在调用前通过 [`peek_pps_id`] 获取, 以便查找参数集.
pub fn parse_slice_header(
    rbsp: &[u8],
    nal_type: u8,
    sps: &Sps,
    pps: &Pps,
) -> TaoResult<SliceHeader> {
    let mut br = BitReader::new(rbsp);
    let mut hdr = SliceHeader {
        first_mb_in_slice: br.read_ue()?,
        slice_type: SliceType::from_raw(br.read_ue()?)?,
        pps_id: br.read_ue_max(255, "H.264: slice pps_id")?,
        ..Default::default()
    };

    if sps.separate_colour_plane_flag {
        br.skip_bits(2)?; // colour_plane_id
    }
    hdr.frame_num = br.read_bits(sps.log2_max_frame_num)?;
    if !sps.frame_mbs_only_flag {
        hdr.field_pic_flag = br.read_flag()?;
        if hdr.field_pic_flag {
            hdr.bottom_field_flag = br.read_flag()?;
        }
    }
    if nal_type == super::nal::NAL_IDR_SLICE {
        hdr.idr_pic_id = br.read_ue()?;
    }
    if sps.poc_type == 0 {
        hdr.poc_lsb = br.read_bits(sps.log2_max_poc_lsb)?;
        if pps.pic_order_present && !hdr.field_pic_flag {
            hdr.delta_poc_bottom = br.read_se()?;
        }
    }
    if sps.poc_type == 1 && !sps.delta_pic_order_always_zero_flag {
        hdr.delta_poc[0] = br.read_se()?;
        if pps.pic_order_present && !hdr.field_pic_flag {
            hdr.delta_poc[1] = br.read_se()?;
        }
    }
    if pps.redundant_pic_cnt_present {
        hdr.redundant_pic_cnt = br.read_ue_max(127, "H.264: redundant_pic_cnt")?;
    }

    Ok(hdr)
}

/// 读取切片头中的 pps_id (跳过 first_mb_in_slice 与 slice_type)
pub fn peek_pps_id(rbsp: &[u8]) -> TaoResult<u32> {
    let mut br = BitReader::new(rbsp);
    br.read_ue()?;
    br.read_ue()?;
    br.read_ue_max(255, "H.264: slice pps_id")
}

/// POC 推导跨切片保存的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PocState {
    prev_poc_msb: i32,
    prev_poc_lsb: i32,
    prev_frame_num: u32,
    prev_frame_num_offset: i32,
}

impl PocState {
    /// 计算当前切片的 POC 并更新状态
    pub fn compute(&mut self, sps: &Sps, hdr: &SliceHeader, idr: bool, ref_idc: u8) -> i32 {
        let (top, bottom) = match sps.poc_type {
            0 => self.poc_type0(sps, hdr, idr, ref_idc),
            1 => self.poc_type1(sps, hdr, idr, ref_idc),
            _ => self.poc_type2(sps, hdr, idr, ref_idc),
        };
        self.prev_frame_num = hdr.frame_num;

        if !hdr.field_pic_flag {
            top.min(bottom)
        } else if hdr.bottom_field_flag {
            bottom
        } else {
            top
        }
    }

    fn poc_type0(&mut self, sps: &Sps, hdr: &SliceHeader, idr: bool, ref_idc: u8) -> (i32, i32) {
        if idr {
            self.prev_poc_msb = 0;
            self.prev_poc_lsb = 0;
        }
        let max_lsb = 1i32 << sps.log2_max_poc_lsb;
        let lsb = hdr.poc_lsb as i32;
        let msb = if lsb < self.prev_poc_lsb && self.prev_poc_lsb - lsb >= max_lsb / 2 {
            self.prev_poc_msb + max_lsb
        } else if lsb > self.prev_poc_lsb && lsb - self.prev_poc_lsb > max_lsb / 2 {
            self.prev_poc_msb - max_lsb
        } else {
            self.prev_poc_msb
        };

        if ref_idc != 0 {
            self.prev_poc_msb = msb;
            self.prev_poc_lsb = lsb;
        }

        let top = msb + lsb;
        let bottom = if hdr.field_pic_flag {
            top
        } else {
            top + hdr.delta_poc_bottom
        };
        (top, bottom)
    }

    fn frame_num_offset(&mut self, sps: &Sps, hdr: &SliceHeader, idr: bool) -> i32 {
        let offset = if idr {
            0
        } else if self.prev_frame_num > hdr.frame_num {
            self.prev_frame_num_offset + (1i32 << sps.log2_max_frame_num)
        } else {
            self.prev_frame_num_offset
        };
        self.prev_frame_num_offset = offset;
        offset
    }

    fn poc_type1(&mut self, sps: &Sps, hdr: &SliceHeader, idr: bool, ref_idc: u8) -> (i32, i32) {
        let offset = self.frame_num_offset(sps, hdr, idr);
        let cycle_len = sps.offset_for_ref_frame.len() as i32;

        let mut abs_frame_num = if cycle_len != 0 {
            offset + hdr.frame_num as i32
        } else {
            0
        };
        if ref_idc == 0 && abs_frame_num > 0 {
            abs_frame_num -= 1;
        }

        let mut expected = 0i32;
        if abs_frame_num > 0 {
            let cycle_cnt = (abs_frame_num - 1) / cycle_len;
            let in_cycle = ((abs_frame_num - 1) % cycle_len) as usize;
            let delta_per_cycle: i32 = sps.offset_for_ref_frame.iter().sum();
            expected = cycle_cnt * delta_per_cycle
                + sps.offset_for_ref_frame[..=in_cycle].iter().sum::<i32>();
        }
        if ref_idc == 0 {
            expected += sps.offset_for_non_ref_pic;
        }

        if !hdr.field_pic_flag {
            let top = expected + hdr.delta_poc[0];
            let bottom = top + sps.offset_for_top_to_bottom_field + hdr.delta_poc[1];
            (top, bottom)
        } else if !hdr.bottom_field_flag {
            let top = expected + hdr.delta_poc[0];
            (top, top)
        } else {
            let bottom = expected + sps.offset_for_top_to_bottom_field + hdr.delta_poc[0];
            (bottom, bottom)
        }
    }

    fn poc_type2(&mut self, sps: &Sps, hdr: &SliceHeader, idr: bool, ref_idc: u8) -> (i32, i32) {
        let offset = self.frame_num_offset(sps, hdr, idr);
        let temp = if idr {
            0
        } else if ref_idc == 0 {
            2 * (offset + hdr.frame_num as i32) - 1
        } else {
            2 * (offset + hdr.frame_num as i32)
        };
        (temp, temp)
    }
}
