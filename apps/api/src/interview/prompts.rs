// All oracle prompt constants for the interview module. The interview is
// conducted in Chinese, matching the product surface; instructions enforce
// JSON-only output and the parser still tolerates surrounding prose.

/// System prompt for keyword mining — enforces JSON-only output.
pub const MINING_SYSTEM: &str = "你是一名技术招聘专家。\
    你必须只输出合法的JSON对象，不添加任何额外文本，不使用markdown代码块，不输出解释。";

/// Resume keyword extraction. Replace `{resume_text}` before sending.
pub const RESUME_KEYWORDS_TEMPLATE: &str = r#"请严格按以下步骤分析简历：
1. 技术扫描：识别简历中提到的所有技术栈、编程语言、框架、工具、算法、方法论和硬技能。
2. 知识过滤：排除非技术词汇（如"团队合作""本科毕业"），仅保留可通过考题验证的知识型关键词。
3. 层级归类：按字段归类关键词，输出格式必须是严格的JSON：

{
  "编程语言": ["Python", "Java"],
  "框架": ["Spring Boot", "React"],
  "工具": ["Docker", "Kubernetes"],
  "领域知识": ["计算机视觉", "微服务架构"]
}

简历内容：
{resume_text}

要求：
- 直接输出JSON，不添加任何额外文本
- 关键词必须完全来自简历原文
- 同类关键词去重（如"Python"和"python"视为重复）
- 不要照搬示例中的关键词"#;

/// Job-description keyword extraction. Replace `{job_description}`.
pub const JD_KEYWORDS_TEMPLATE: &str = r#"请从下面的招聘要求中提取可用于技术面试提问的能力关键词，
按类别归类，输出格式必须是严格的JSON：

{
  "核心技能": ["分布式系统", "Transformer"],
  "工具": ["Redis", "Kafka"],
  "基础": ["Linux基础", "SQL查询"]
}

招聘要求：
{job_description}

要求：
- 直接输出JSON，不添加任何额外文本
- 同类关键词去重
- 不要照搬示例中的关键词"#;

/// Role-generic keyword extraction from a bare job title. Replace `{job_title}`.
pub const TITLE_KEYWORDS_TEMPLATE: &str = r#"给定职位名称"{job_title}"，列出该职位面试时通常会考察的技术关键词，
输出格式必须是严格的JSON：

{
  "通用考察点": ["数据结构", "操作系统", "网络协议"]
}

要求：
- 直接输出JSON，不添加任何额外文本
- 关键词应当与职位强相关，宁缺毋滥"#;

/// System prompt for question generation.
pub const GENERATION_SYSTEM: &str = "你是一名资深技术面试官，向应聘者提出有深度的技术问题。\
    你必须只输出一个合法的JSON对象，包含question和answer两个字段，不添加任何额外文本。";

/// Question generation. Replace `{directive_hint}`, `{keyword}`, `{history}`.
pub const GENERATION_TEMPLATE: &str = r#"请基于目标关键词和历史对话生成一道面试题，并附上你心目中的标准答案。

目标关键词：{keyword}

出题方式：{directive_hint}

最近的对话记录：
{history}

提问规则：
1. 深度递进：首次出现的关键词考察基础理解；已有基础回答则升级到应用场景或实战挑战。
2. 避免重复：确保问题与历史记录中最近几轮不重复。
3. 标准答案应覆盖要点即可，不超过200字。

输出格式必须是严格的JSON：
{"question": "……", "answer": "……"}"#;

/// Directive hints spliced into `GENERATION_TEMPLATE`.
pub const HINT_FIRST_QUESTION: &str = "这是面试的第一个问题，从该关键词的基础原理问起。";
pub const HINT_DEEPEN: &str = "应聘者刚才回答得不错，请针对同一关键词追问更深入的应用或原理。";
pub const HINT_NEXT_TOPIC: &str = "请切换到这个新的关键词，从基础理解问起。";
pub const HINT_RANDOM_FALLBACK: &str = "关键词已全部问过一轮，请围绕该关键词换一个不同的角度出题。";

/// System prompt for reply evaluation.
pub const EVALUATION_SYSTEM: &str = "你是一名严格的技术面试评委，对照标准答案为应聘者的回答打分。\
    你必须只输出一个合法的JSON对象，包含score和comment两个字段，不添加任何额外文本。";

/// Reply evaluation. Replace `{candidate_reply}`, `{expected_answer}`, `{history}`.
pub const EVALUATION_TEMPLATE: &str = r#"请对照标准答案为应聘者的回答打分。

应聘者的回答：
{candidate_reply}

标准答案：
{expected_answer}

最近的对话记录：
{history}

评分规则：
- score为0到100的整数，60为及格线，只答出关键词而无展开不超过50分。
- comment为一句不超过50字的点评，指出亮点或缺失的要点。

输出格式必须是严格的JSON：
{"score": 80, "comment": "……"}"#;

/// System prompt for the closing-phase roles reversal (candidate asks, AI answers).
pub const CANDIDATE_QA_SYSTEM: &str = "你是一名面试官，面试提问已经结束，现在轮到应聘者向你提问。\
    请以面试官的身份简洁作答。你必须只输出一个合法的JSON对象，包含answer一个字段，不添加任何额外文本。";

/// Closing-phase answer generation. Replace `{question}`, `{history}`.
pub const CANDIDATE_QA_TEMPLATE: &str = r#"应聘者的提问：
{question}

最近的对话记录：
{history}

请以面试官的身份回答应聘者的提问，不超过150字。

输出格式必须是严格的JSON：
{"answer": "……"}"#;
